//! Fitness and behavior-characterization collaborators
//!
//! Both observe the instance once per tick through `update` and produce a
//! result with `calculate` at the end of the run. One prototype is copied per
//! environment and reset between trials.

use std::fmt;

use crate::sim::instance::InstanceView;
use crate::util::point::Point2D;

pub trait FitnessFunction: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Scalar fitness plus objective values
    fn calculate(&self, view: &InstanceView<'_>) -> (f64, Vec<f64>);

    fn update(&mut self, view: &InstanceView<'_>);

    fn reset(&mut self);

    fn copy(&self) -> Box<dyn FitnessFunction>;
}

pub trait BehaviorCharacterization: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn calculate(&self, view: &InstanceView<'_>) -> Vec<f64>;

    fn update(&mut self, view: &InstanceView<'_>);

    fn reset(&mut self);

    fn copy(&self) -> Box<dyn BehaviorCharacterization>;
}

/// Distance at which goal credit halves
const GOAL_SCALE: f64 = 100.0;

/// Rewards each robot for how close it ever got to a goal point.
///
/// The goal is the explicit point if set, else the environment's first point
/// of interest, else the center of its area of interest.
#[derive(Debug, Clone, Default)]
pub struct SingleGoalPoint {
    pub goal: Option<Point2D>,
    closest: Vec<f64>,
}

impl SingleGoalPoint {
    pub fn new(goal: Option<Point2D>) -> Self {
        Self {
            goal,
            closest: Vec::new(),
        }
    }

    fn goal_for(&self, view: &InstanceView<'_>) -> Point2D {
        self.goal
            .or_else(|| view.environment.poi.first().copied())
            .unwrap_or_else(|| {
                let aoi = view.environment.aoi;
                Point2D::new(aoi.x + aoi.width / 2.0, aoi.y + aoi.height / 2.0)
            })
    }
}

impl FitnessFunction for SingleGoalPoint {
    fn name(&self) -> &'static str {
        "single_goal_point"
    }

    fn calculate(&self, view: &InstanceView<'_>) -> (f64, Vec<f64>) {
        if view.robots.is_empty() {
            return (0.0, vec![0.0, 0.0]);
        }
        let goal = self.goal_for(view);
        let credit: f64 = view
            .robots
            .iter()
            .map(|r| {
                let d = self
                    .closest
                    .get(r.id)
                    .copied()
                    .unwrap_or_else(|| r.position.distance(goal));
                1.0 / (1.0 + d / GOAL_SCALE)
            })
            .sum();
        let fitness = credit / view.robots.len() as f64;
        let collisions: f64 = view.robots.iter().map(|r| f64::from(r.collisions)).sum();
        (fitness, vec![fitness, -collisions])
    }

    fn update(&mut self, view: &InstanceView<'_>) {
        let goal = self.goal_for(view);
        if self.closest.len() < view.robots.len() {
            self.closest.resize(view.robots.len(), f64::INFINITY);
        }
        for r in view.robots {
            let d = r.position.distance(goal);
            if let Some(best) = self.closest.get_mut(r.id) {
                *best = best.min(d);
            }
        }
    }

    fn reset(&mut self) {
        self.closest.clear();
    }

    fn copy(&self) -> Box<dyn FitnessFunction> {
        Box::new(self.clone())
    }
}

/// Final position of every robot, flattened as x0, y0, x1, y1, ...
#[derive(Debug, Clone, Default)]
pub struct EndPointBC {
    last: Vec<Point2D>,
}

impl BehaviorCharacterization for EndPointBC {
    fn name(&self) -> &'static str {
        "end_point"
    }

    fn calculate(&self, view: &InstanceView<'_>) -> Vec<f64> {
        let points: Vec<Point2D> = if self.last.is_empty() {
            view.robots.iter().map(|r| r.position).collect()
        } else {
            self.last.clone()
        };
        points.iter().flat_map(|p| [p.x, p.y]).collect()
    }

    fn update(&mut self, view: &InstanceView<'_>) {
        self.last.clear();
        self.last.extend(view.robots.iter().map(|r| r.position));
    }

    fn reset(&mut self) {
        self.last.clear();
    }

    fn copy(&self) -> Box<dyn BehaviorCharacterization> {
        Box::new(self.clone())
    }
}
