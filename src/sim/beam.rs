//! Laser beam propagation
//!
//! Every tick the engine recomputes, from scratch, the set of targets lit by
//! all emitters and reflectors. Reflectors only fire once something already
//! lights them, and the order they are listed in is arbitrary, so a reflector
//! that is not lit yet is parked in a skipped list and retried whenever
//! another reflector resolves. Each reflector resolves at most once per tick
//! and the lit set only grows within a tick, so resolution always reaches a
//! fixed point in at most one productive pass per reflector.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;

use super::EntityId;
use super::query::{Aabb, Hit, LayerMask, SpatialQuery, cast_end};
use crate::Direction;

/// How a beam source picks its directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Fires one fixed direction
    Emitter(Direction),
    /// Fires every cardinal direction except back at whatever lit it
    Reflector,
}

/// A beam source taking part in this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSource {
    pub id: EntityId,
    pub bounds: Aabb,
    pub kind: SourceKind,
}

/// Capability of entities that can fire beams this tick
pub trait EmitsBeams {
    /// `None` while the entity cannot fire (destroyed, transitioning, ...)
    fn beam_source(&self) -> Option<BeamSource>;
}

/// One straight beam, for renderers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamSegment {
    pub source: EntityId,
    pub direction: Direction,
    pub start: Vec2,
    /// Contact point, or the end of the beam's range when nothing was hit
    pub end: Vec2,
    /// Entity the beam stopped on (targets and blockers alike)
    pub hit: Option<EntityId>,
}

/// Targets whose lit state changed this tick. Exits dispatch before enters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BeamTransitions {
    pub exited: Vec<EntityId>,
    pub entered: Vec<EntityId>,
}

impl BeamTransitions {
    pub fn is_empty(&self) -> bool {
        self.exited.is_empty() && self.entered.is_empty()
    }
}

/// Bookkeeping from the last `resolve`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Reflectors that fired
    pub resolved: usize,
    /// Reflectors never lit this tick
    pub unresolved: usize,
    /// Passes over the skipped list that resolved at least one reflector
    pub passes: usize,
}

/// Computes the lit set each tick and tracks enter/exit transitions
#[derive(Debug, Clone)]
pub struct BeamEngine {
    /// Beam length in tiles
    range: f32,
    /// Targets each source hit this tick, in hit order
    hits: BTreeMap<EntityId, Vec<EntityId>>,
    segments: Vec<BeamSegment>,
    lit: BTreeSet<EntityId>,
    previous: BTreeSet<EntityId>,
    stats: ResolveStats,
}

impl BeamEngine {
    pub fn new(range: f32) -> Self {
        Self {
            range,
            hits: BTreeMap::new(),
            segments: Vec::new(),
            lit: BTreeSet::new(),
            previous: BTreeSet::new(),
            stats: ResolveStats::default(),
        }
    }

    /// Targets lit by the last resolve, ordered by id
    pub fn lit(&self) -> &BTreeSet<EntityId> {
        &self.lit
    }

    pub fn is_lit(&self, target: EntityId) -> bool {
        self.lit.contains(&target)
    }

    pub fn segments(&self) -> &[BeamSegment] {
        &self.segments
    }

    pub fn stats(&self) -> ResolveStats {
        self.stats
    }

    /// True when `source` hit `target` this tick
    pub fn has_hit(&self, source: EntityId, target: EntityId) -> bool {
        self.hits
            .get(&source)
            .is_some_and(|targets| targets.contains(&target))
    }

    /// Targets hit by `source` this tick
    pub fn targets_of(&self, source: EntityId) -> &[EntityId] {
        self.hits.get(&source).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Drop an entity that no longer exists. It counts as exited and is
    /// never reported again.
    pub fn forget(&mut self, id: EntityId) {
        self.lit.remove(&id);
        self.previous.remove(&id);
        self.hits.remove(&id);
    }

    /// Start a new tick: last tick's lit set becomes the comparison base
    fn reset(&mut self) {
        self.hits.clear();
        self.segments.clear();
        self.previous = std::mem::take(&mut self.lit);
        self.stats = ResolveStats::default();
    }

    /// Recompute the lit set from `emitters` and `reflectors`
    pub fn resolve<Q: SpatialQuery>(
        &mut self,
        emitters: &[BeamSource],
        reflectors: &[BeamSource],
        query: &Q,
    ) -> ResolveStats {
        self.reset();

        for emitter in emitters {
            match emitter.kind {
                SourceKind::Emitter(dir) => self.fire(emitter, &[dir], query),
                SourceKind::Reflector => {
                    log::warn!("Reflector {} passed as an emitter, skipping", emitter.id)
                }
            }
        }

        let mut resolved: BTreeSet<EntityId> = BTreeSet::new();
        let mut skipped: Vec<&BeamSource> = Vec::new();

        for reflector in reflectors {
            if resolved.contains(&reflector.id) {
                continue;
            }
            if !self.lit.contains(&reflector.id) {
                skipped.push(reflector);
                continue;
            }

            self.resolve_reflector(reflector, query);
            resolved.insert(reflector.id);

            // Something this reflector lit may be a reflector skipped earlier
            self.drain_skipped(&mut skipped, &mut resolved, query);
        }

        skipped.retain(|r| !resolved.contains(&r.id));
        self.stats.resolved = resolved.len();
        self.stats.unresolved = skipped.len();

        log::debug!(
            "Beams: {} lit, {} reflectors resolved, {} unlit, {} passes",
            self.lit.len(),
            self.stats.resolved,
            self.stats.unresolved,
            self.stats.passes
        );

        self.stats
    }

    /// Retry skipped reflectors until a full pass resolves none of them
    fn drain_skipped<Q: SpatialQuery>(
        &mut self,
        skipped: &mut Vec<&BeamSource>,
        resolved: &mut BTreeSet<EntityId>,
        query: &Q,
    ) {
        loop {
            let mut progressed = false;
            let mut i = 0;
            while i < skipped.len() {
                let candidate = skipped[i];
                if resolved.contains(&candidate.id) {
                    skipped.remove(i);
                    continue;
                }
                if !self.lit.contains(&candidate.id) {
                    i += 1;
                    continue;
                }
                skipped.remove(i);
                self.resolve_reflector(candidate, query);
                resolved.insert(candidate.id);
                progressed = true;
            }

            if !progressed {
                break;
            }
            self.stats.passes += 1;
        }
    }

    fn resolve_reflector<Q: SpatialQuery>(&mut self, reflector: &BeamSource, query: &Q) {
        let directions = self.reflected_directions(reflector, query);
        log::debug!("Reflector {} fires {:?}", reflector.id, directions);
        self.fire(reflector, &directions, query);
    }

    /// Every cardinal direction except those whose first hit is a source
    /// that already hit this reflector. Only one level of "who lit me" is
    /// checked.
    fn reflected_directions<Q: SpatialQuery>(
        &self,
        reflector: &BeamSource,
        query: &Q,
    ) -> Vec<Direction> {
        Direction::ALL
            .into_iter()
            .filter(|dir| match self.cast(reflector, *dir, query) {
                Some(hit) => !self.has_hit(hit.entity, reflector.id),
                None => true,
            })
            .collect()
    }

    fn cast<Q: SpatialQuery>(&self, source: &BeamSource, dir: Direction, query: &Q) -> Option<Hit> {
        let origin = source.bounds.face_center(dir);
        let end = cast_end(origin, dir, self.range);
        query.linecast(origin, end, LayerMask::BEAM, Some(source.id))
    }

    fn fire<Q: SpatialQuery>(&mut self, source: &BeamSource, directions: &[Direction], query: &Q) {
        for &dir in directions {
            let origin = source.bounds.face_center(dir);
            let hit = self.cast(source, dir, query);

            self.segments.push(BeamSegment {
                source: source.id,
                direction: dir,
                start: origin,
                end: hit
                    .map(|h| h.point)
                    .unwrap_or_else(|| cast_end(origin, dir, self.range)),
                hit: hit.map(|h| h.entity),
            });

            // A beam stopped by a blocker lights nothing
            let Some(hit) = hit.filter(|h| h.layers.contains(LayerMask::LASER_TARGET)) else {
                continue;
            };

            let targets = self.hits.entry(source.id).or_default();
            if !targets.contains(&hit.entity) {
                targets.push(hit.entity);
            }
            // Duplicate hits collapse in the set
            self.lit.insert(hit.entity);
        }
    }

    /// Differences between the last two resolves: targets that went dark,
    /// then targets that lit up
    pub fn transitions(&self) -> BeamTransitions {
        BeamTransitions {
            exited: self.previous.difference(&self.lit).copied().collect(),
            entered: self.lit.difference(&self.previous).copied().collect(),
        }
    }
}
