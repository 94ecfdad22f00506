//! Per-tick simulation core
//!
//! An evaluation instance owns its environment copy, robots, collision
//! manager, agent brain, fitness collaborators, and RNG. Instances never
//! share mutable state, so many can run in parallel.

pub mod brain;
pub mod collision;
pub mod constants;
pub mod environment;
pub mod evaluator;
pub mod fitness;
pub mod instance;
pub mod network;
pub mod robot;
pub mod sensor;
pub mod step;
pub mod substrate;

/// Deterministic per-instance random source
pub type SimRng = rand_chacha::ChaCha8Rng;

pub use brain::{AgentBrain, BrainTopology};
pub use collision::{CollisionKind, CollisionManager, CollisionSettings, GridCollision, StandardCollision};
pub use environment::{AoiRect, Environment, Wall};
pub use evaluator::{EvaluationResult, Evaluator};
pub use instance::{InstancePack, InstanceView};
pub use robot::{Body, DriveParams, Robot, RobotModel};
pub use step::{run_evaluation, run_tick};
