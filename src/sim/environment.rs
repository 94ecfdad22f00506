//! Static world description: walls, formation anchor, region of interest
//!
//! An `Environment` is immutable once loaded. Each evaluation instance holds
//! its own deep copy; the per-instance RNG lives in the instance pack.

use serde::{Deserialize, Serialize};

use crate::util::line::Line2D;
use crate::util::point::Point2D;

/// A wall segment. Invisible walls never collide and never block rays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub line: Line2D,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub name: String,
}

fn default_visible() -> bool {
    true
}

impl Wall {
    pub fn new(p1: Point2D, p2: Point2D) -> Self {
        Self {
            line: Line2D::new(p1, p2),
            visible: true,
            name: String::new(),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Axis-aligned rectangle (region of interest)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AoiRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl AoiRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Containment on truncated integer coordinates, right/bottom edges exclusive
    pub fn contains(&self, p: Point2D) -> bool {
        let (px, py) = (p.x.trunc(), p.y.trunc());
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}

impl Default for AoiRect {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub walls: Vec<Wall>,
    pub start_point: Point2D,
    /// Distance between consecutive robots in the starting formation
    pub robot_spacing: f64,
    /// Formation direction (degrees)
    pub group_orientation: f64,
    /// Default starting heading (degrees)
    pub robot_heading: f64,
    #[serde(default)]
    pub aoi: AoiRect,
    /// Scalar cue read by signal sensors
    #[serde(default)]
    pub signal: f64,
    /// Points of interest, consumed by fitness functions
    #[serde(default)]
    pub poi: Vec<Point2D>,
    /// Robots start on autopilot and drive straight until inside the AOI
    #[serde(default)]
    pub autopilot: bool,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            walls: Vec::new(),
            start_point: Point2D::ZERO,
            robot_spacing: 30.0,
            group_orientation: 0.0,
            robot_heading: 0.0,
            aoi: AoiRect::default(),
            signal: 0.0,
            poi: Vec::new(),
            autopilot: false,
        }
    }

    /// Rectangular arena of `width` x `height` with its corner at the origin
    pub fn bounded_arena(name: impl Into<String>, width: f64, height: f64) -> Self {
        let mut env = Self::new(name);
        let corners = [
            Point2D::new(0.0, 0.0),
            Point2D::new(width, 0.0),
            Point2D::new(width, height),
            Point2D::new(0.0, height),
        ];
        for i in 0..corners.len() {
            env.walls
                .push(Wall::new(corners[i], corners[(i + 1) % corners.len()]));
        }
        env.aoi = AoiRect::new(0.0, 0.0, width, height);
        env
    }

    pub fn with_wall(mut self, wall: Wall) -> Self {
        self.walls.push(wall);
        self
    }

    /// Deep copy for an independent evaluation instance
    pub fn copy(&self) -> Self {
        self.clone()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn visible_walls(&self) -> impl Iterator<Item = (usize, &Wall)> {
        self.walls.iter().enumerate().filter(|(_, w)| w.visible)
    }
}
