//! Drawing hooks for external renderers
//!
//! The simulation never draws on its own. A renderer implements [`Canvas`]
//! and asks each entity to draw itself through [`Drawable::draw`]; geometry
//! arrives already mapped into display space by the [`CoordinateFrame`].

use crate::sim::collision::GridCollision;
use crate::sim::environment::Environment;
use crate::sim::robot::Robot;
use crate::sim::sensor::Sensor;
use crate::util::frame::CoordinateFrame;
use crate::util::point::Point2D;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const WALL: Color = Color::rgba(0.1, 0.1, 0.1, 1.0);
    pub const AOI: Color = Color::rgba(0.2, 0.6, 0.2, 0.5);
    pub const POI: Color = Color::rgba(0.9, 0.6, 0.1, 1.0);
    pub const ROBOT: Color = Color::rgba(0.2, 0.3, 0.9, 1.0);
    pub const COLLIDING: Color = Color::rgba(0.9, 0.1, 0.1, 1.0);
    pub const SENSOR: Color = Color::rgba(0.5, 0.5, 0.5, 0.6);
    pub const GRID: Color = Color::rgba(0.7, 0.7, 0.7, 0.3);
}

/// Display-space drawing surface
pub trait Canvas {
    fn line(&mut self, from: Point2D, to: Point2D, color: Color);

    fn circle(&mut self, center: Point2D, radius: f64, color: Color);

    /// Axis-aligned rectangle from its minimum corner
    fn rect(&mut self, min: Point2D, size: Point2D, color: Color);
}

pub trait Drawable {
    fn draw(&self, canvas: &mut dyn Canvas, frame: &CoordinateFrame);
}

/// Radius of a point-of-interest marker, in display units
const POI_MARKER: f64 = 3.0;

impl Drawable for Environment {
    fn draw(&self, canvas: &mut dyn Canvas, frame: &CoordinateFrame) {
        let aoi = self.aoi;
        canvas.rect(
            frame.to_display(Point2D::new(aoi.x, aoi.y)),
            frame.offset_to_display(Point2D::new(aoi.width, aoi.height)),
            Color::AOI,
        );

        for (_, wall) in self.visible_walls() {
            canvas.line(
                frame.to_display(wall.line.p1),
                frame.to_display(wall.line.p2),
                Color::WALL,
            );
        }

        for &p in &self.poi {
            canvas.circle(frame.to_display(p), POI_MARKER, Color::POI);
        }
    }
}

impl Drawable for Robot {
    fn draw(&self, canvas: &mut dyn Canvas, frame: &CoordinateFrame) {
        let center = frame.to_display(self.position);
        let color = if self.collide_last {
            Color::COLLIDING
        } else {
            Color::ROBOT
        };
        canvas.circle(center, self.radius / frame.scale, color);

        // Heading tick
        let nose = self.position + Point2D::from_angle(self.heading) * self.radius;
        canvas.line(center, frame.to_display(nose), color);

        // Rangefinder beams at their last measured length
        for sensor in &self.sensors {
            if let Sensor::RangeFinder(rf) = sensor {
                let origin = self.position + rf.offset;
                let tip = origin + Point2D::from_angle(self.heading + rf.angle) * rf.distance;
                canvas.line(frame.to_display(origin), frame.to_display(tip), Color::SENSOR);
            }
        }
    }
}

impl Drawable for GridCollision {
    fn draw(&self, canvas: &mut dyn Canvas, frame: &CoordinateFrame) {
        let size = self.cell_size();
        let extent = frame.offset_to_display(Point2D::new(size, size));
        for (cx, cy) in self.occupied_cells() {
            let min = Point2D::new(f64::from(cx) * size, f64::from(cy) * size);
            canvas.rect(frame.to_display(min), extent, Color::GRID);
        }
    }
}
