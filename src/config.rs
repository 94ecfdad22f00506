use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::sim::brain::BrainTopology;
use crate::sim::collision::{CollisionKind, CollisionSettings};
use crate::sim::constants::{brain, grid, sensor, timing};
use crate::sim::robot::RobotModel;

/// Experiment configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Robots per team
    pub number_robots: usize,
    /// Controller topology
    pub topology: BrainTopology,
    /// Rangefinders per robot
    pub rangefinder_density: usize,
    /// Simulated seconds per tick
    pub timestep: f64,
    /// Simulated seconds per evaluation instance
    pub evaluation_time: f64,
    /// Collision manager implementation
    pub collision: CollisionKind,
    /// Edge length of a collision grid cell
    pub grid_cell_size: f64,
    /// Robots appear to rays and radar
    pub agents_visible: bool,
    /// Robot-robot overlap counts as a collision
    pub agents_collide: bool,
    /// Undo a robot's move when it collides
    pub collision_penalty: bool,
    /// Sensor noise ceiling (percent)
    pub sensor_noise: f64,
    /// Wheel-speed noise ceiling (percent)
    pub effector_noise: f64,
    /// Starting heading noise (degrees)
    pub heading_noise: f64,
    /// Trials per environment
    pub times_to_run_environments: usize,
    /// Network propagation steps per tick
    pub activation_steps: usize,
    /// Use the formation below instead of the environment's
    pub override_team_formation: bool,
    /// Formation direction (degrees)
    pub group_orientation: f64,
    /// Distance between consecutive robots
    pub group_spacing: f64,
    /// Starting heading (degrees)
    pub robot_heading: f64,
    pub robot_model: RobotModel,
    /// Brains in a multi-brain stack
    pub stack_size: usize,
    /// Hidden neurons per robot in the substrate
    pub hidden_neurons: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            number_robots: 1,
            topology: BrainTopology::SharedNetwork,
            rangefinder_density: sensor::RANGEFINDER_DENSITY,
            timestep: timing::TIMESTEP,
            evaluation_time: timing::EVALUATION_TIME,
            collision: CollisionKind::Standard,
            grid_cell_size: grid::CELL_SIZE,
            agents_visible: true,
            agents_collide: true,
            collision_penalty: false,
            sensor_noise: 0.0,
            effector_noise: 0.0,
            heading_noise: 0.0,
            times_to_run_environments: 1,
            activation_steps: brain::ACTIVATION_STEPS,
            override_team_formation: false,
            group_orientation: 0.0,
            group_spacing: 30.0,
            robot_heading: 0.0,
            robot_model: RobotModel::Khepera3,
            stack_size: brain::STACK_SIZE,
            hidden_neurons: 8,
        }
    }
}

/// Parse an environment variable, warning and returning None if it is set
/// but unusable
fn env_value<T: FromStr>(name: &str, valid: impl Fn(&T) -> bool, requirement: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(parsed) if valid(&parsed) => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} must be {}, using default", name, requirement);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

impl ExperimentConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(n) = env_value("NUMBER_ROBOTS", |&n: &usize| n > 0 && n <= 1000, "1-1000") {
            config.number_robots = n;
        }

        if let Some(dt) = env_value("TIMESTEP", |&t: &f64| t > 0.0 && t.is_finite(), "> 0") {
            config.timestep = dt;
        }

        if let Some(t) = env_value("EVALUATION_TIME", |&t: &f64| t > 0.0 && t.is_finite(), "> 0") {
            config.evaluation_time = t;
        }

        if let Some(grid) = env_value("GRID_COLLISION", |_: &bool| true, "true or false") {
            config.collision = if grid {
                CollisionKind::Grid
            } else {
                CollisionKind::Standard
            };
        }

        if let Some(steps) = env_value("ACTIVATION_STEPS", |&s: &usize| s > 0 && s <= 100, "1-100") {
            config.activation_steps = steps;
        }

        if let Ok(topology) = std::env::var("TEAM_TOPOLOGY") {
            match topology.to_ascii_lowercase().as_str() {
                "shared" | "shared_network" => config.topology = BrainTopology::SharedNetwork,
                "clone" | "per_robot_clone" => config.topology = BrainTopology::PerRobotClone,
                "stack" | "multi_brain_stack" => config.topology = BrainTopology::MultiBrainStack,
                _ => tracing::warn!("Invalid TEAM_TOPOLOGY '{}', using default", topology),
            }
        }

        if let Some(d) = env_value("RANGEFINDER_DENSITY", |&d: &usize| d > 0 && d <= 360, "1-360") {
            config.rangefinder_density = d;
        }

        config
    }

    /// Load a JSON config; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let unreadable = |reason: String| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| unreadable(e.to_string()))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, requirement| Err(ConfigError::Invalid { field, requirement });

        if self.number_robots == 0 {
            return invalid("number_robots", "at least 1");
        }
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return invalid("timestep", "a positive number");
        }
        if !(self.evaluation_time > 0.0 && self.evaluation_time.is_finite()) {
            return invalid("evaluation_time", "a positive number");
        }
        if !(self.grid_cell_size > 0.0 && self.grid_cell_size.is_finite()) {
            return invalid("grid_cell_size", "a positive number");
        }
        if self.activation_steps == 0 {
            return invalid("activation_steps", "at least 1");
        }
        if self.times_to_run_environments == 0 {
            return invalid("times_to_run_environments", "at least 1");
        }
        if self.topology == BrainTopology::MultiBrainStack && self.stack_size == 0 {
            return invalid("stack_size", "at least 1 for a multi-brain stack");
        }
        if self.sensor_noise < 0.0 || self.effector_noise < 0.0 || self.heading_noise < 0.0 {
            return invalid("noise", "non-negative");
        }
        Ok(())
    }

    pub fn collision_settings(&self) -> CollisionSettings {
        CollisionSettings {
            agents_visible: self.agents_visible,
            agents_collide: self.agents_collide,
        }
    }
}
