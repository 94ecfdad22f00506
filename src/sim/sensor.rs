//! Robot sensors: rangefinder rays, radar cones, and the environment signal
//!
//! Sensors hold no reference to their robot. The owner's current [`Body`]
//! is passed in on every update.

use crate::sim::collision::{CollisionManager, HitObject};
use crate::sim::environment::Environment;
use crate::sim::robot::Body;
use crate::util::point::{normalize_angle, Point2D};

/// Everything a sensor may read during one update
pub struct SensorContext<'a> {
    pub environment: &'a Environment,
    pub bodies: &'a [Body],
    pub collisions: &'a dyn CollisionManager,
}

/// A single ray cast relative to the robot's heading
#[derive(Debug, Clone, PartialEq)]
pub struct RangeFinder {
    /// Ray angle relative to heading (radians)
    pub angle: f64,
    pub max_range: f64,
    /// Mount point relative to the robot center, in world orientation
    pub offset: Point2D,
    /// Last measured distance
    pub distance: f64,
    pub hit: Option<HitObject>,
}

impl RangeFinder {
    pub fn new(angle: f64, max_range: f64) -> Self {
        Self {
            angle,
            max_range,
            offset: Point2D::ZERO,
            distance: max_range,
            hit: None,
        }
    }

    pub fn update(&mut self, owner: &Body, ctx: &SensorContext<'_>) {
        let result = ctx.collisions.raycast(
            owner.heading + self.angle,
            self.max_range,
            owner.position + self.offset,
            Some(owner.id),
            ctx.bodies,
        );
        self.distance = result.distance;
        self.hit = result.hit;
    }

    /// 0 when touching, 1 when nothing is in range
    pub fn activation(&self) -> f64 {
        self.distance / self.max_range
    }
}

/// A pie-slice detector for the nearest other robot
#[derive(Debug, Clone, PartialEq)]
pub struct Radar {
    /// Start of the slice relative to heading (radians)
    pub start_angle: f64,
    /// End of the slice relative to heading (radians)
    pub end_angle: f64,
    pub max_range: f64,
    /// Mount point relative to the robot center, in world orientation
    pub offset: Point2D,
    /// Distance to the nearest in-cone robot, or `max_range`
    pub distance: f64,
}

impl Radar {
    pub fn new(start_angle: f64, end_angle: f64, max_range: f64) -> Self {
        Self {
            start_angle,
            end_angle,
            max_range,
            offset: Point2D::ZERO,
            distance: max_range,
        }
    }

    pub fn update(&mut self, owner: &Body, ctx: &SensorContext<'_>) {
        let candidates: &[Body] = if ctx.collisions.settings().agents_visible {
            ctx.bodies
        } else {
            &[]
        };
        self.distance = scan_cone(self, owner, candidates);
    }

    /// 1 when a robot is touching, 0 when none is in range
    pub fn activation(&self) -> f64 {
        1.0 - self.distance / self.max_range
    }
}

/// Reads the environment's scalar signal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalSensor {
    pub value: f64,
}

impl SignalSensor {
    pub fn update(&mut self, ctx: &SensorContext<'_>) {
        self.value = ctx.environment.signal;
    }

    pub fn activation(&self) -> f64 {
        self.value
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sensor {
    RangeFinder(RangeFinder),
    Radar(Radar),
    Signal(SignalSensor),
}

impl Sensor {
    pub fn update(&mut self, owner: &Body, ctx: &SensorContext<'_>) {
        match self {
            Sensor::RangeFinder(s) => s.update(owner, ctx),
            Sensor::Radar(s) => s.update(owner, ctx),
            Sensor::Signal(s) => s.update(ctx),
        }
    }

    pub fn activation(&self) -> f64 {
        match self {
            Sensor::RangeFinder(s) => s.activation(),
            Sensor::Radar(s) => s.activation(),
            Sensor::Signal(s) => s.activation(),
        }
    }

    pub fn is_rangefinder(&self) -> bool {
        matches!(self, Sensor::RangeFinder(_))
    }
}

/// Distance to the nearest candidate inside the radar's cone, or `max_range`.
///
/// The cone edges are turned by the owner's heading and folded into
/// [0, 2π); bearings are measured from the owner's position plus the radar
/// offset. The owner is never a candidate. A cone whose end precedes its
/// start wraps through 0. Among equidistant candidates the first in slice
/// order wins.
pub fn scan_cone(radar: &Radar, owner: &Body, candidates: &[Body]) -> f64 {
    let origin = owner.position + radar.offset;
    let start = normalize_angle(radar.start_angle + owner.heading);
    let end = normalize_angle(radar.end_angle + owner.heading);
    let mut distance = radar.max_range;

    for other in candidates.iter().filter(|c| c.id != owner.id) {
        let bearing = origin.bearing_to(other.position);
        let in_cone = if start <= end {
            bearing >= start && bearing <= end
        } else {
            bearing >= start || bearing <= end
        };
        if !in_cone {
            continue;
        }

        let d = origin.distance(other.position);
        if d < distance {
            distance = d;
        }
    }

    distance
}
