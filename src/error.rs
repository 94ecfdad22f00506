//! Error types for configuration, controller decoding, and simulation ticks

use serde::Serialize;

use crate::util::point::Point2D;

/// Invalid experiment configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be {requirement}")]
    Invalid {
        field: &'static str,
        requirement: &'static str,
    },
    #[error("failed to read config file {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

/// Failure while decoding a genome into executable networks
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("genome expects {expected} inputs, substrate provides {actual}")]
    InputWidth { expected: usize, actual: usize },
    #[error("genome expects {expected} outputs, substrate provides {actual}")]
    OutputWidth { expected: usize, actual: usize },
    #[error("substrate has no {0} neurons")]
    EmptyLayer(&'static str),
    #[error("decoder cannot produce {0} brains")]
    StackSize(usize),
}

/// Errors raised by the agent brain
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BrainError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("brain index {index} out of range (stack holds {len})")]
    NoSuchBrain { index: usize, len: usize },
    #[error("brain selection requires a multi-brain stack")]
    NotAStack,
}

/// Unrecoverable failure during one simulation tick.
///
/// Aborts the instance that raised it; sibling instances are unaffected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimulationError {
    #[error("robot {robot} reached a non-finite pose ({x}, {y}, heading {heading})")]
    NonFinitePose {
        robot: usize,
        x: f64,
        y: f64,
        heading: f64,
    },
    #[error("network produced {actual} outputs, {robots} robots need a multiple of {robots}")]
    OutputWidth { actual: usize, robots: usize },
    #[error("registered listener {0} has no matching robot")]
    UnknownListener(usize),
    #[error("robot {0} has no network to drive it")]
    MissingNetwork(usize),
    #[error(transparent)]
    Brain(#[from] BrainError),
}

/// Full trajectory of one robot, dumped when an instance aborts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotTrail {
    pub robot: usize,
    pub history: Vec<Point2D>,
}

/// An aborted evaluation instance with its diagnostic trail
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("evaluation aborted at tick {tick}: {kind}")]
pub struct EvaluationFailure {
    pub kind: SimulationError,
    pub tick: u64,
    pub trail: Vec<RobotTrail>,
}

impl EvaluationFailure {
    /// Emit every recorded position, one line per sample
    pub fn log_trail(&self) {
        for trail in &self.trail {
            for (sample, p) in trail.history.iter().enumerate() {
                tracing::error!("{} {} {} {}", trail.robot, sample, p.x, p.y);
            }
        }
    }
}
