//! Uniform-grid collision manager
//!
//! Walls are bucketed once into every cell their bounding box overlaps.
//! Robots are bucketed into every cell their bounding box overlaps and are
//! re-bucketed whenever they move. Queries only test objects that share a
//! cell with the query, then apply the exact same primitives as
//! [`StandardCollision`](super::StandardCollision).

use bitvec::prelude::*;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::sim::collision::{
    ray_robot_distance, ray_wall_distance, robot_robot_collide, wall_robot_collide,
    CollisionManager, CollisionSettings, HitObject, RayHit,
};
use crate::sim::constants::grid::{CELL_INITIAL_CAPACITY, CELL_SIZE, INITIAL_CAPACITY};
use crate::sim::environment::{Environment, Wall};
use crate::sim::robot::Body;
use crate::util::point::Point2D;

/// Grid cell key - (x, y) cell coordinates
pub type CellKey = (i32, i32);

/// Bounding boxes are padded by this much before bucketing so that rounding
/// at a cell boundary can only add candidates, never drop one.
const BUCKET_MARGIN: f64 = 1e-7;

/// Cells a single robot occupies; a robot smaller than a cell spans at most 4
type Span = SmallVec<[CellKey; 4]>;

#[derive(Debug, Clone)]
pub struct GridCollision {
    settings: CollisionSettings,
    /// Cell size in world units
    cell_size: f64,
    /// Inverse cell size for fast position-to-cell conversion
    inv_cell_size: f64,
    walls: Vec<Wall>,
    wall_cells: HashMap<CellKey, Vec<usize>>,
    robot_cells: HashMap<CellKey, Vec<usize>>,
    /// Current span of each robot, indexed by robot id
    robot_spans: Vec<Span>,
}

impl GridCollision {
    /// Create an empty grid. Non-positive cell sizes fall back to the default.
    pub fn new(settings: CollisionSettings, cell_size: f64) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            CELL_SIZE
        };
        Self {
            settings,
            cell_size,
            inv_cell_size: 1.0 / cell_size,
            walls: Vec::new(),
            wall_cells: HashMap::with_capacity(INITIAL_CAPACITY),
            robot_cells: HashMap::with_capacity(INITIAL_CAPACITY),
            robot_spans: Vec::new(),
        }
    }

    #[inline]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Convert world position to cell key
    #[inline]
    fn position_to_cell(&self, position: Point2D) -> CellKey {
        (
            (position.x * self.inv_cell_size).floor() as i32,
            (position.y * self.inv_cell_size).floor() as i32,
        )
    }

    /// Every cell overlapped by the padded box `[min, max]`
    fn cells_in_box(&self, min: Point2D, max: Point2D) -> impl Iterator<Item = CellKey> {
        let pad = Point2D::new(BUCKET_MARGIN, BUCKET_MARGIN);
        let (x0, y0) = self.position_to_cell(min - pad);
        let (x1, y1) = self.position_to_cell(max + pad);
        (x0..=x1).flat_map(move |x| (y0..=y1).map(move |y| (x, y)))
    }

    fn body_cells(&self, body: &Body) -> Span {
        let r = Point2D::new(body.radius, body.radius);
        self.cells_in_box(body.position - r, body.position + r)
            .collect()
    }

    fn insert_robot(&mut self, body: &Body) {
        let span = self.body_cells(body);
        for key in &span {
            self.robot_cells
                .entry(*key)
                .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
                .push(body.id);
        }
        if self.robot_spans.len() <= body.id {
            self.robot_spans.resize_with(body.id + 1, Span::new);
        }
        self.robot_spans[body.id] = span;
    }

    fn remove_robot(&mut self, id: usize) {
        let Some(span) = self.robot_spans.get_mut(id) else {
            return;
        };
        for key in span.drain(..) {
            if let Some(cell) = self.robot_cells.get_mut(&key) {
                if let Some(idx) = cell.iter().position(|&r| r == id) {
                    cell.swap_remove(idx);
                }
            }
        }
    }

    /// Rebuild the robot buckets from scratch
    fn rebuild_robots(&mut self, bodies: &[Body]) {
        for cell in self.robot_cells.values_mut() {
            cell.clear();
        }
        self.robot_spans.clear();
        for body in bodies {
            self.insert_robot(body);
        }
    }

    /// Test every wall and robot bucketed in `cell` against the ray
    #[allow(clippy::too_many_arguments)]
    fn ray_test_cell(
        &self,
        cell: CellKey,
        origin: Point2D,
        direction: Point2D,
        max_range: f64,
        owner: Option<usize>,
        bodies: &[Body],
        seen_walls: &mut BitVec,
        seen_robots: &mut BitVec,
        best: &mut RayHit,
    ) {
        if let Some(walls) = self.wall_cells.get(&cell) {
            for &idx in walls {
                if seen_walls.replace(idx, true) {
                    continue;
                }
                if let Some(d) = ray_wall_distance(origin, direction, max_range, &self.walls[idx]) {
                    best.offer(d, HitObject::Wall(idx));
                }
            }
        }

        if !self.settings.agents_visible {
            return;
        }
        if let Some(robots) = self.robot_cells.get(&cell) {
            for &id in robots {
                if Some(id) == owner || id >= seen_robots.len() || seen_robots.replace(id, true) {
                    continue;
                }
                if let Some(d) = ray_robot_distance(origin, direction, max_range, &bodies[id]) {
                    best.offer(d, HitObject::Robot(id));
                }
            }
        }
    }

    /// Statistics about the grid
    pub fn stats(&self) -> GridStats {
        let non_empty_cells = self
            .wall_cells
            .keys()
            .chain(self.robot_cells.iter().filter(|(_, c)| !c.is_empty()).map(|(k, _)| k))
            .collect::<hashbrown::HashSet<_>>()
            .len();
        let wall_entries: usize = self.wall_cells.values().map(|c| c.len()).sum();
        let robot_entries: usize = self.robot_cells.values().map(|c| c.len()).sum();
        let max_per_cell = self
            .wall_cells
            .iter()
            .map(|(k, w)| w.len() + self.robot_cells.get(k).map_or(0, |r| r.len()))
            .chain(self.robot_cells.values().map(|r| r.len()))
            .max()
            .unwrap_or(0);

        GridStats {
            non_empty_cells,
            wall_entries,
            robot_entries,
            max_per_cell,
        }
    }

    /// Occupied cells, for overlays
    pub fn occupied_cells(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.wall_cells.keys().copied().chain(
            self.robot_cells
                .iter()
                .filter(|(k, c)| !c.is_empty() && !self.wall_cells.contains_key(*k))
                .map(|(k, _)| *k),
        )
    }
}

impl Default for GridCollision {
    fn default() -> Self {
        Self::new(CollisionSettings::default(), CELL_SIZE)
    }
}

impl CollisionManager for GridCollision {
    fn initialize(&mut self, environment: &Environment, bodies: &[Body]) {
        self.walls = environment.walls.clone();
        self.wall_cells.clear();

        for (idx, wall) in self.walls.iter().enumerate() {
            if !wall.visible {
                continue;
            }
            let (min, max) = wall.line.bounds();
            for key in self.cells_in_box(min, max) {
                self.wall_cells
                    .entry(key)
                    .or_insert_with(|| Vec::with_capacity(CELL_INITIAL_CAPACITY))
                    .push(idx);
            }
        }

        self.rebuild_robots(bodies);
    }

    fn simulation_step_callback(&mut self, bodies: &[Body]) {
        self.rebuild_robots(bodies);
    }

    fn robot_moved(&mut self, body: &Body) {
        self.remove_robot(body.id);
        self.insert_robot(body);
    }

    fn robot_collide(&self, robot: &Body, bodies: &[Body]) -> bool {
        let span = self.body_cells(robot);

        let mut seen_walls = bitvec![0; self.walls.len()];
        for key in &span {
            let Some(walls) = self.wall_cells.get(key) else {
                continue;
            };
            for &idx in walls {
                if seen_walls.replace(idx, true) {
                    continue;
                }
                if wall_robot_collide(&self.walls[idx], robot.position, robot.radius) {
                    return true;
                }
            }
        }

        if !self.settings.agents_collide {
            return false;
        }

        for key in &span {
            let Some(robots) = self.robot_cells.get(key) else {
                continue;
            };
            for &id in robots {
                if id == robot.id {
                    continue;
                }
                if let Some(other) = bodies.get(id) {
                    debug_assert_eq!(other.id, id, "bodies must be indexed by robot id");
                    if robot_robot_collide(robot, other) {
                        return true;
                    }
                }
            }
        }

        false
    }

    /// Walks the cells along the ray in order (DDA) and stops once the best
    /// hit lies inside the cells already visited.
    fn raycast(
        &self,
        angle: f64,
        max_range: f64,
        origin: Point2D,
        owner: Option<usize>,
        bodies: &[Body],
    ) -> RayHit {
        let direction = Point2D::from_angle(angle);
        // A NaN pose has no cell to walk from
        if !origin.is_finite() || !direction.is_finite() {
            return RayHit::miss(max_range);
        }
        let mut best = RayHit::miss(max_range);
        let mut seen_walls = bitvec![0; self.walls.len()];
        let mut seen_robots = bitvec![0; bodies.len()];

        let (mut cx, mut cy) = self.position_to_cell(origin);
        let cs = self.cell_size;

        let axis = |o: f64, d: f64, c: i32| -> (i32, f64, f64) {
            if d > 0.0 {
                (1, ((c + 1) as f64 * cs - o) / d, cs / d)
            } else if d < 0.0 {
                (-1, (c as f64 * cs - o) / d, -cs / d)
            } else {
                (0, f64::INFINITY, f64::INFINITY)
            }
        };
        let (step_x, mut t_max_x, t_delta_x) = axis(origin.x, direction.x, cx);
        let (step_y, mut t_max_y, t_delta_y) = axis(origin.y, direction.y, cy);

        // An origin on a cell boundary also tests the cells it touches
        for key in self.cells_in_box(origin, origin) {
            self.ray_test_cell(
                key,
                origin,
                direction,
                max_range,
                owner,
                bodies,
                &mut seen_walls,
                &mut seen_robots,
                &mut best,
            );
        }

        loop {
            let t_exit = t_max_x.min(t_max_y);
            if best.hit.is_some() && best.distance < t_exit {
                break;
            }
            if t_exit > max_range {
                break;
            }

            if t_max_x < t_max_y {
                cx += step_x;
                t_max_x += t_delta_x;
            } else {
                cy += step_y;
                t_max_y += t_delta_y;
            }

            self.ray_test_cell(
                (cx, cy),
                origin,
                direction,
                max_range,
                owner,
                bodies,
                &mut seen_walls,
                &mut seen_robots,
                &mut best,
            );
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

/// Statistics about the collision grid
#[derive(Debug, Clone)]
pub struct GridStats {
    pub non_empty_cells: usize,
    pub wall_entries: usize,
    pub robot_entries: usize,
    pub max_per_cell: usize,
}
