//! Evaluation instance: everything one simulation run owns

use crate::error::RobotTrail;
use crate::sim::brain::AgentBrain;
use crate::sim::collision::CollisionManager;
use crate::sim::environment::Environment;
use crate::sim::fitness::{BehaviorCharacterization, FitnessFunction};
use crate::sim::robot::{Body, Robot};
use crate::sim::SimRng;

/// Read-only snapshot handed to fitness and behavior collaborators
#[derive(Debug, Clone, Copy)]
pub struct InstanceView<'a> {
    pub environment: &'a Environment,
    pub robots: &'a [Robot],
    /// Simulated seconds since the instance started
    pub elapsed: f64,
    pub time_steps: u64,
    pub timestep: f64,
}

/// One evaluation instance.
///
/// Exclusively owned by the evaluation that created it; nothing here is
/// shared with sibling instances.
#[derive(Debug)]
pub struct InstancePack {
    pub environment: Environment,
    /// Indexed by robot id
    pub robots: Vec<Robot>,
    pub collision_manager: Box<dyn CollisionManager>,
    pub agent_brain: AgentBrain,
    pub fitness: Box<dyn FitnessFunction>,
    pub behavior: Option<Box<dyn BehaviorCharacterization>>,
    pub rng: SimRng,
    pub elapsed: f64,
    pub time_steps: u64,
    pub timestep: f64,
    /// Trial number within the environment
    pub trial: usize,
}

impl InstancePack {
    pub fn view(&self) -> InstanceView<'_> {
        InstanceView {
            environment: &self.environment,
            robots: &self.robots,
            elapsed: self.elapsed,
            time_steps: self.time_steps,
            timestep: self.timestep,
        }
    }

    /// Current body of every robot, indexed by robot id
    pub fn bodies(&self) -> Vec<Body> {
        self.robots.iter().map(Robot::body).collect()
    }

    pub fn trails(&self) -> Vec<RobotTrail> {
        self.robots.iter().map(Robot::trail).collect()
    }

    pub fn total_collisions(&self) -> u64 {
        self.robots.iter().map(|r| u64::from(r.collisions)).sum()
    }
}
