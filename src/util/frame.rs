//! Affine mapping between simulation space and display space
//!
//! Display = (sim - center) / scale. Only renderers consume this; the
//! simulation itself never draws.

use serde::{Deserialize, Serialize};

use crate::util::point::Point2D;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordinateFrame {
    /// Simulation-space point mapped to the display origin
    pub cx: f64,
    pub cy: f64,
    /// Simulation units per display unit
    pub scale: f64,
    pub rotation: f64,
}

impl CoordinateFrame {
    pub fn new(cx: f64, cy: f64, scale: f64, rotation: f64) -> Self {
        Self {
            cx,
            cy,
            scale,
            rotation,
        }
    }

    /// Simulation space -> display space
    #[inline]
    pub fn to_display(&self, p: Point2D) -> Point2D {
        Point2D::new((p.x - self.cx) / self.scale, (p.y - self.cy) / self.scale)
    }

    /// Display space -> simulation space
    #[inline]
    pub fn from_display(&self, p: Point2D) -> Point2D {
        Point2D::new(p.x * self.scale + self.cx, p.y * self.scale + self.cy)
    }

    /// Convert a simulation-space delta (not an absolute point)
    #[inline]
    pub fn offset_to_display(&self, d: Point2D) -> Point2D {
        Point2D::new(d.x / self.scale, d.y / self.scale)
    }

    /// Convert a display-space delta into simulation units
    #[inline]
    pub fn offset_from_display(&self, d: Point2D) -> Point2D {
        Point2D::new(d.x * self.scale, d.y * self.scale)
    }

    /// Pan by a display-space delta
    pub fn pan(&mut self, display_delta: Point2D) {
        let d = self.offset_from_display(display_delta);
        self.cx -= d.x;
        self.cy -= d.y;
    }
}

impl Default for CoordinateFrame {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, 0.0)
    }
}
