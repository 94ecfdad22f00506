//! Evolutionary-robotics simulation core
//!
//! Evaluates already-decoded team controllers by running robot teams through
//! 2D wall environments: collision detection (brute force or uniform grid),
//! cone sensing, team brains in three topologies, and a deterministic tick
//! driver. Population evaluation runs genomes in parallel on rayon.

pub mod config;
pub mod error;
pub mod metrics;
pub mod render;
pub mod sim;
pub mod util;

pub use config::ExperimentConfig;
pub use error::{BrainError, ConfigError, DecodeError, EvaluationFailure, SimulationError};
pub use metrics::EvaluationMetrics;
