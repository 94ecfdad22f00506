//! Robot state, sensor suite, and differential-drive kinematics

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::error::{RobotTrail, SimulationError};
use crate::sim::constants::{robot, sensor};
use crate::sim::sensor::{Radar, RangeFinder, Sensor, SensorContext, SignalSensor};
use crate::sim::SimRng;
use crate::util::point::{normalize_angle, Point2D};

/// Pose snapshot handed to collision and sensing queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub id: usize,
    pub position: Point2D,
    /// Radians, world frame
    pub heading: f64,
    pub radius: f64,
}

/// Sensor layout of a robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RobotModel {
    /// Rangefinders across the front half plus four radar quadrants
    #[default]
    Khepera3,
    /// Khepera3 plus a signal sensor (dropped in multi-brain mode)
    Khepera3ComeHome,
}

impl RobotModel {
    pub fn has_signal(self, multi_brain: bool) -> bool {
        matches!(self, RobotModel::Khepera3ComeHome) && !multi_brain
    }

    /// Sensor count per input layer; layer 0 is the rangefinders
    pub fn input_layers(self, rangefinder_density: usize, multi_brain: bool) -> Vec<usize> {
        let mut layers = vec![rangefinder_density, sensor::RADAR_SLICES];
        if self.has_signal(multi_brain) {
            layers.push(1);
        }
        layers
    }

    /// Build the ordered sensor suite
    pub fn sensor_suite(self, rangefinder_density: usize, multi_brain: bool) -> Vec<Sensor> {
        let mut sensors = Vec::with_capacity(rangefinder_density + sensor::RADAR_SLICES + 1);

        for i in 0..rangefinder_density {
            let angle = if rangefinder_density == 1 {
                0.0
            } else {
                -FRAC_PI_2 + PI * i as f64 / (rangefinder_density - 1) as f64
            };
            sensors.push(Sensor::RangeFinder(RangeFinder::new(
                angle,
                sensor::RANGEFINDER_RANGE,
            )));
        }

        let slice = 2.0 * PI / sensor::RADAR_SLICES as f64;
        for i in 0..sensor::RADAR_SLICES {
            let start = -FRAC_PI_4 + slice * i as f64;
            sensors.push(Sensor::Radar(Radar::new(
                start,
                start + slice,
                sensor::RADAR_RANGE,
            )));
        }

        if self.has_signal(multi_brain) {
            sensors.push(Sensor::Signal(SignalSensor::default()));
        }

        sensors
    }
}

/// Actuation parameters shared by every robot in an instance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveParams {
    pub max_speed: f64,
    /// Percent perturbation of sensor activations
    pub sensor_noise: f64,
    /// Percent perturbation of wheel speeds
    pub effector_noise: f64,
    /// Undo the colliding move
    pub collision_penalty: bool,
    pub timestep: f64,
}

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            max_speed: robot::MAX_SPEED,
            sensor_noise: 0.0,
            effector_noise: 0.0,
            collision_penalty: false,
            timestep: crate::sim::constants::timing::TIMESTEP,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Robot {
    pub id: usize,
    pub position: Point2D,
    /// Radians in [0, 2π)
    pub heading: f64,
    pub radius: f64,
    pub model: RobotModel,
    pub sensors: Vec<Sensor>,
    /// Collision result of the previous tick
    pub collide_last: bool,
    pub collisions: u32,
    /// Drive straight, ignoring the controller
    pub autopilot: bool,
    /// Role coordinate selecting this robot's slice of a team controller
    pub zstack: f32,
    pub drive: DriveParams,
    /// Every pose this robot has occupied, oldest first
    pub history: Vec<Point2D>,
    inputs: Vec<f32>,
    outputs: Vec<f32>,
    previous: (Point2D, f64),
}

impl Robot {
    pub fn new(id: usize, position: Point2D, heading: f64, model: RobotModel, drive: DriveParams) -> Self {
        let heading = normalize_angle(heading);
        Self {
            id,
            position,
            heading,
            radius: robot::RADIUS,
            model,
            sensors: Vec::new(),
            collide_last: false,
            collisions: 0,
            autopilot: false,
            zstack: 0.0,
            drive,
            history: vec![position],
            inputs: Vec::new(),
            outputs: Vec::new(),
            previous: (position, heading),
        }
    }

    /// Install the model's sensor suite
    pub fn populate_sensors(&mut self, rangefinder_density: usize, multi_brain: bool) {
        self.sensors = self.model.sensor_suite(rangefinder_density, multi_brain);
        self.inputs = vec![0.0; self.sensors.len()];
    }

    pub fn rangefinder_count(&self) -> usize {
        self.sensors.iter().filter(|s| s.is_rangefinder()).count()
    }

    #[inline]
    pub fn body(&self) -> Body {
        Body {
            id: self.id,
            position: self.position,
            heading: self.heading,
            radius: self.radius,
        }
    }

    /// Latest (possibly noisy) sensor activations, in sensor order
    pub fn inputs(&self) -> &[f32] {
        &self.inputs
    }

    /// Latest controller outputs delivered to this robot
    pub fn outputs(&self) -> &[f32] {
        &self.outputs
    }

    /// Refresh every sensor and the activation vector
    pub fn update_sensors(&mut self, ctx: &SensorContext<'_>, rng: &mut SimRng) {
        let body = self.body();
        let noise = self.drive.sensor_noise / 100.0;
        self.inputs.clear();
        for s in &mut self.sensors {
            s.update(&body, ctx);
            let mut activation = s.activation();
            if noise > 0.0 {
                activation *= 1.0 + noise * rng.gen_range(-1.0..=1.0);
            }
            self.inputs.push(activation as f32);
        }
    }

    /// Controller output callback
    pub fn receive_outputs(&mut self, outputs: &[f32]) {
        self.outputs.clear();
        self.outputs.extend_from_slice(outputs);
    }

    /// Advance one tick of differential drive.
    ///
    /// On autopilot both wheels run at a fixed fraction of top speed. Otherwise
    /// the two latest controller outputs in [0, 1] set the wheel speeds; a
    /// robot that has not received outputs yet stays put.
    ///
    /// A NaN output leaves the pose NaN and the robot keeps ticking. Only an
    /// infinite wheel speed fails the tick.
    pub fn do_action(&mut self, rng: &mut SimRng) -> Result<(), SimulationError> {
        self.previous = (self.position, self.heading);
        let max = self.drive.max_speed;

        let (mut left, mut right) = if self.autopilot {
            let v = max * robot::AUTOPILOT_SPEED_RATIO;
            (v, v)
        } else {
            let wheel = |i: usize| {
                self.outputs
                    .get(i)
                    .map_or(0.0, |&o| (f64::from(o) - 0.5) * 2.0 * max)
            };
            (wheel(0), wheel(1))
        };

        let noise = self.drive.effector_noise / 100.0;
        if noise > 0.0 {
            left *= 1.0 + noise * rng.gen_range(-1.0..=1.0);
            right *= 1.0 + noise * rng.gen_range(-1.0..=1.0);
        }

        let dt = self.drive.timestep;
        let speed = (left + right) / 2.0;
        let turn = (right - left) / (2.0 * self.radius);

        self.heading = normalize_angle(self.heading + turn * dt);
        self.position += Point2D::from_angle(self.heading) * (speed * dt);

        // NaN outputs carry through to the pose; an infinite wheel speed cannot
        if left.is_infinite() || right.is_infinite() {
            return Err(SimulationError::NonFinitePose {
                robot: self.id,
                x: self.position.x,
                y: self.position.y,
                heading: self.heading,
            });
        }

        self.history.push(self.position);
        Ok(())
    }

    /// Collision hook; returns true if the pose was rolled back
    pub fn on_collision(&mut self) -> bool {
        self.collisions += 1;
        if self.drive.collision_penalty {
            (self.position, self.heading) = self.previous;
            return true;
        }
        false
    }

    pub fn trail(&self) -> RobotTrail {
        RobotTrail {
            robot: self.id,
            history: self.history.clone(),
        }
    }
}
