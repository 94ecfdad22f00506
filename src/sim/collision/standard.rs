//! Brute-force collision manager: every query scans every wall and robot

use crate::sim::collision::{
    ray_robot_distance, ray_wall_distance, robot_robot_collide, wall_robot_collide,
    CollisionManager, CollisionSettings, HitObject, RayHit,
};
use crate::sim::environment::{Environment, Wall};
use crate::sim::robot::Body;
use crate::util::point::Point2D;

#[derive(Debug, Clone, Default)]
pub struct StandardCollision {
    settings: CollisionSettings,
    walls: Vec<Wall>,
}

impl StandardCollision {
    pub fn new(settings: CollisionSettings) -> Self {
        Self {
            settings,
            walls: Vec::new(),
        }
    }
}

impl CollisionManager for StandardCollision {
    fn initialize(&mut self, environment: &Environment, _bodies: &[Body]) {
        self.walls = environment.walls.clone();
    }

    fn robot_collide(&self, robot: &Body, bodies: &[Body]) -> bool {
        if self
            .walls
            .iter()
            .any(|wall| wall_robot_collide(wall, robot.position, robot.radius))
        {
            return true;
        }

        if !self.settings.agents_collide {
            return false;
        }

        bodies
            .iter()
            .filter(|other| other.id != robot.id)
            .any(|other| robot_robot_collide(robot, other))
    }

    fn raycast(
        &self,
        angle: f64,
        max_range: f64,
        origin: Point2D,
        owner: Option<usize>,
        bodies: &[Body],
    ) -> RayHit {
        let direction = Point2D::from_angle(angle);
        let mut best = RayHit::miss(max_range);

        for (idx, wall) in self.walls.iter().enumerate() {
            if let Some(d) = ray_wall_distance(origin, direction, max_range, wall) {
                best.offer(d, HitObject::Wall(idx));
            }
        }

        if self.settings.agents_visible {
            for body in bodies.iter().filter(|b| Some(b.id) != owner) {
                if let Some(d) = ray_robot_distance(origin, direction, max_range, body) {
                    best.offer(d, HitObject::Robot(body.id));
                }
            }
        }

        best
    }

    fn settings(&self) -> CollisionSettings {
        self.settings
    }

    fn copy(&self) -> Box<dyn CollisionManager> {
        Box::new(self.clone())
    }
}
