//! Spatial queries over axis-aligned colliders
//!
//! Beams and player movement both ask the same question: walking a segment
//! from `origin` to `end`, what is the first collider on one of the masked
//! layers? Colliders are rebuilt from the entities every tick, so the set is
//! a flat list; levels are a handful of cells across.

use bitflags::bitflags;
use glam::Vec2;

use super::EntityId;
use super::grid::Cell;
use crate::consts::COLLIDER_HALF_EXTENT;
use crate::{Direction, cell_center};

bitflags! {
    /// Physics layers a collider belongs to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LayerMask: u32 {
        /// Receives beam enter/exit notifications (and stops the beam)
        const LASER_TARGET = 1 << 0;
        /// Stops beams without reacting to them
        const LASER_BLOCKER = 1 << 1;
        /// Stops player movement
        const SOLID = 1 << 2;
        /// Sits on a node, preventing tile placement there
        const OCCUPANT = 1 << 3;
        /// The player avatar
        const PLAYER = 1 << 4;

        /// Everything a beam can hit
        const BEAM = Self::LASER_TARGET.bits() | Self::LASER_BLOCKER.bits();
    }
}

/// Axis-aligned bounding box in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn centered(center: Vec2, half_extent: f32) -> Self {
        let half = Vec2::splat(half_extent);
        Self::new(center - half, center + half)
    }

    /// Standard collider for an object sitting on `cell`
    pub fn from_cell(cell: Cell) -> Self {
        Self::centered(cell_center(cell), COLLIDER_HALF_EXTENT)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Centre of the face pointing in `dir` (where a beam leaves the box)
    pub fn face_center(&self, dir: Direction) -> Vec2 {
        let c = self.center();
        match dir {
            Direction::Up => Vec2::new(c.x, self.max.y),
            Direction::Left => Vec2::new(self.min.x, c.y),
            Direction::Down => Vec2::new(c.x, self.min.y),
            Direction::Right => Vec2::new(self.max.x, c.y),
        }
    }

    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Slab test: parameter `t` in [0, 1] where the segment first touches
    /// the box, or `None` when it misses.
    pub fn segment_entry(&self, start: Vec2, end: Vec2) -> Option<f32> {
        let delta = end - start;
        let mut t_min = 0.0_f32;
        let mut t_max = 1.0_f32;

        for axis in 0..2 {
            let (s, d, lo, hi) = (start[axis], delta[axis], self.min[axis], self.max[axis]);
            if d.abs() < f32::EPSILON {
                // Parallel to this slab
                if s < lo || s > hi {
                    return None;
                }
                continue;
            }
            let mut t0 = (lo - s) / d;
            let mut t1 = (hi - s) / d;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }

        Some(t_min)
    }
}

/// Result of a linecast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// First contact point along the segment
    pub point: Vec2,
    /// Entity owning the collider that was hit
    pub entity: EntityId,
    /// Layers of the collider that was hit
    pub layers: LayerMask,
}

/// Ray intersection service supplied to the beam engine and movement checks
pub trait SpatialQuery {
    /// First collider on `mask` touched by the segment `origin..end`,
    /// skipping the collider owned by `ignore` (the caster itself).
    fn linecast(
        &self,
        origin: Vec2,
        end: Vec2,
        mask: LayerMask,
        ignore: Option<EntityId>,
    ) -> Option<Hit>;
}

/// A collider registered for this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub entity: EntityId,
    pub bounds: Aabb,
    pub layers: LayerMask,
}

/// Flat collider list, rebuilt from the entities each tick
#[derive(Debug, Clone, Default)]
pub struct ColliderSet {
    colliders: Vec<Collider>,
}

impl ColliderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.colliders.clear();
    }

    pub fn push(&mut self, entity: EntityId, bounds: Aabb, layers: LayerMask) {
        if layers.is_empty() {
            return;
        }
        self.colliders.push(Collider {
            entity,
            bounds,
            layers,
        });
    }
}

impl SpatialQuery for ColliderSet {
    fn linecast(
        &self,
        origin: Vec2,
        end: Vec2,
        mask: LayerMask,
        ignore: Option<EntityId>,
    ) -> Option<Hit> {
        let mut best: Option<(f32, &Collider)> = None;

        for collider in &self.colliders {
            if !collider.layers.intersects(mask) || Some(collider.entity) == ignore {
                continue;
            }
            let Some(t) = collider.bounds.segment_entry(origin, end) else {
                continue;
            };
            // Ties go to the lower id so results never depend on push order
            let closer = match best {
                None => true,
                Some((best_t, best_c)) => {
                    t < best_t || (t == best_t && collider.entity < best_c.entity)
                }
            };
            if closer {
                best = Some((t, collider));
            }
        }

        best.map(|(t, collider)| Hit {
            point: origin + (end - origin) * t,
            entity: collider.entity,
            layers: collider.layers,
        })
    }
}

/// End point of a cardinal cast of `range` tiles from `origin`
#[inline]
pub fn cast_end(origin: Vec2, dir: Direction, range: f32) -> Vec2 {
    origin + dir.vector() * range
}
