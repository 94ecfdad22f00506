/// Time-stepping defaults
pub mod timing {
    /// Seconds of simulated time per tick
    pub const TIMESTEP: f64 = 0.16;
    /// Simulated seconds per evaluation instance
    pub const EVALUATION_TIME: f64 = 100.0;
}

/// Controller execution constants
pub mod brain {
    /// Network propagation steps per tick.
    /// Chosen empirically; not derived from network depth.
    pub const ACTIVATION_STEPS: usize = 2;
    /// Number of brains in a multi-brain stack
    pub const STACK_SIZE: usize = 2;
}

/// Robot body and drive constants
pub mod robot {
    /// Default body radius (world units)
    pub const RADIUS: f64 = 6.5;
    /// Top wheel speed (world units per second)
    pub const MAX_SPEED: f64 = 20.0;
    /// Fraction of top speed used while on autopilot
    pub const AUTOPILOT_SPEED_RATIO: f64 = 0.5;
    /// Controller outputs consumed per robot (left wheel, right wheel)
    pub const OUTPUTS: usize = 2;
}

/// Sensor suite constants
pub mod sensor {
    /// Rangefinder probe length
    pub const RANGEFINDER_RANGE: f64 = 100.0;
    /// Radar cone reach
    pub const RADAR_RANGE: f64 = 200.0;
    /// Default number of rangefinders in the front arc
    pub const RANGEFINDER_DENSITY: usize = 5;
    /// Radar quadrants around the body
    pub const RADAR_SLICES: usize = 4;
}

/// Collision grid constants
pub mod grid {
    /// Default grid cell edge length (world units).
    /// Should be at least ~2x the robot radius to keep per-robot cell spans small.
    pub const CELL_SIZE: f64 = 50.0;
    /// Initial capacity for the cell hashmap
    pub const INITIAL_CAPACITY: usize = 256;
    /// Initial capacity for per-cell entry vectors
    pub const CELL_INITIAL_CAPACITY: usize = 8;
}

/// Evaluation constants
pub mod evaluation {
    /// Fitness assigned to an aborted instance
    pub const SENTINEL_FITNESS: f64 = 0.0001;
    /// Width of the accumulated objective vector
    pub const OBJECTIVES: usize = 6;
    /// Seed of the RNG that draws per-trial noise levels
    pub const NOISE_LEVEL_SEED: u64 = 100;
}
