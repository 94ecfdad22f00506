//! Collision detection and ray queries
//!
//! Two interchangeable managers implement [`CollisionManager`]:
//! - [`StandardCollision`] tests every wall and robot pairwise.
//! - [`GridCollision`] buckets walls and robots into a uniform grid.
//!
//! Both must return identical answers for identical inputs. The grid only
//! changes the cost of a query, never its result. Wall-wall pairs are never
//! tested; walls are static.
//!
//! Managers hold no reference to the robot list. Every query receives the
//! current robot [`Body`] snapshots, indexed so that `bodies[i].id == i`.

pub mod grid;
pub mod standard;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sim::environment::{Environment, Wall};
use crate::sim::robot::Body;
use crate::util::line::{ray_circle_distance, Line2D};
use crate::util::point::Point2D;

pub use grid::GridCollision;
pub use standard::StandardCollision;

/// Which collision manager an experiment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionKind {
    #[default]
    Standard,
    Grid,
}

/// Agent interaction switches shared by all managers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionSettings {
    /// Robots are visible to rays and cone scans
    pub agents_visible: bool,
    /// Robot-robot overlap counts as a collision
    pub agents_collide: bool,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            agents_visible: true,
            agents_collide: true,
        }
    }
}

/// Object struck by a ray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HitObject {
    Wall(usize),
    Robot(usize),
}

/// Result of a ray query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f64,
    pub hit: Option<HitObject>,
}

impl RayHit {
    /// Nothing within range: distance is the range itself
    pub fn miss(max_range: f64) -> Self {
        Self {
            distance: max_range,
            hit: None,
        }
    }

    /// Offer a candidate hit; keeps the nearer one.
    ///
    /// Equal distances go to the object a pairwise scan would meet first
    /// (walls before robots, lower index first), so traversal order never
    /// changes the answer.
    #[inline]
    pub fn offer(&mut self, distance: f64, object: HitObject) {
        let better = match self.hit {
            None => distance < self.distance,
            Some(current) => {
                distance < self.distance || (distance == self.distance && object < current)
            }
        };
        if better {
            self.distance = distance;
            self.hit = Some(object);
        }
    }
}

/// Collision detection and ray casting for one evaluation instance
pub trait CollisionManager: Send + Sync + fmt::Debug {
    /// Bind to an environment and the initial robot bodies
    fn initialize(&mut self, environment: &Environment, bodies: &[Body]);

    /// Once-per-tick housekeeping before sensing and action
    fn simulation_step_callback(&mut self, _bodies: &[Body]) {}

    /// A single robot changed pose mid-tick
    fn robot_moved(&mut self, _body: &Body) {}

    /// True iff `robot` overlaps any visible wall or (if enabled) any other robot
    fn robot_collide(&self, robot: &Body, bodies: &[Body]) -> bool;

    /// Nearest hit along a ray of `max_range` cast from `origin` at `angle`.
    /// `owner` is never reported as a hit.
    fn raycast(
        &self,
        angle: f64,
        max_range: f64,
        origin: Point2D,
        owner: Option<usize>,
        bodies: &[Body],
    ) -> RayHit;

    fn settings(&self) -> CollisionSettings;

    /// Deep clone, so each instance gets its own manager from a shared template
    fn copy(&self) -> Box<dyn CollisionManager>;
}

/// Build a manager of the requested kind
pub fn create(kind: CollisionKind, settings: CollisionSettings, cell_size: f64) -> Box<dyn CollisionManager> {
    match kind {
        CollisionKind::Standard => Box::new(StandardCollision::new(settings)),
        CollisionKind::Grid => Box::new(GridCollision::new(settings, cell_size)),
    }
}

/// Wall-robot overlap.
///
/// Projects the robot center onto the wall. Inside the segment, collision iff
/// the squared distance to the projected point is below the squared radius;
/// outside it, collision iff either endpoint lies within the radius.
pub fn wall_robot_collide(wall: &Wall, center: Point2D, radius: f64) -> bool {
    if !wall.visible {
        return false;
    }
    let rad_sq = radius * radius;
    let r = wall.line.projection_param(center);

    if (0.0..=1.0).contains(&r) {
        return wall.line.point_at(r).distance_sq(center) < rad_sq;
    }

    center.distance_sq(wall.line.p1) < rad_sq || center.distance_sq(wall.line.p2) < rad_sq
}

/// Circle-circle overlap. Touching (equal distance) is not a collision.
#[inline]
pub fn robot_robot_collide(a: &Body, b: &Body) -> bool {
    a.position.distance(b.position) < a.radius + b.radius
}

/// Distance along a ray to a visible wall, if the ray reaches it
pub fn ray_wall_distance(
    origin: Point2D,
    direction: Point2D,
    max_range: f64,
    wall: &Wall,
) -> Option<f64> {
    if !wall.visible {
        return None;
    }
    let ray = Line2D::new(origin, origin + direction * max_range);
    ray.intersection(&wall.line).map(|p| origin.distance(p))
}

/// Distance along a ray to another robot's body
#[inline]
pub fn ray_robot_distance(
    origin: Point2D,
    direction: Point2D,
    max_range: f64,
    body: &Body,
) -> Option<f64> {
    ray_circle_distance(origin, direction, max_range, body.position, body.radius)
}
