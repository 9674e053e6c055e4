//! Level objects that react to beams
//!
//! - `Rock`: explodes the first time a beam touches it
//! - `Emitter`: fires a fixed beam, and explodes when another beam hits it
//! - `PowerTile`: powered while lit, cues on change
//! - `WinTile`: opens once every power tile is powered

use super::EntityId;
use super::beam::{BeamSource, EmitsBeams, SourceKind};
use super::grid::Cell;
use super::query::{Aabb, LayerMask};
use super::state::GameEvent;
use super::tile::{PlacedTile, TileKind};
use crate::Direction;

/// Receives lit-state changes from the beam engine. Enter and exit are
/// edge-triggered: a target is told once when it becomes lit and once when
/// it goes dark.
pub trait LaserTarget {
    fn on_laser_enter(&mut self, events: &mut Vec<GameEvent>);
    fn on_laser_exit(&mut self, events: &mut Vec<GameEvent>);
}

/// Explosion lifecycle shared by rocks and emitters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detonation {
    Intact,
    Exploding { remaining: f32 },
    Destroyed,
}

impl Detonation {
    /// Start exploding. Returns false if already exploding or gone.
    pub fn ignite(&mut self, duration: f32) -> bool {
        if *self != Detonation::Intact {
            return false;
        }
        *self = if duration <= 0.0 {
            Detonation::Destroyed
        } else {
            Detonation::Exploding {
                remaining: duration,
            }
        };
        true
    }

    /// Returns true on the step the object is destroyed
    pub fn update(&mut self, dt: f32) -> bool {
        if let Detonation::Exploding { remaining } = self {
            *remaining -= dt;
            if *remaining <= 0.0 {
                *self = Detonation::Destroyed;
                return true;
            }
        }
        false
    }

    pub fn is_destroyed(&self) -> bool {
        matches!(self, Detonation::Destroyed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rock {
    pub id: EntityId,
    pub cell: Cell,
    pub detonation: Detonation,
    explosion_time: f32,
}

impl Rock {
    pub fn new(id: EntityId, cell: Cell, explosion_time: f32) -> Self {
        Self {
            id,
            cell,
            detonation: Detonation::Intact,
            explosion_time,
        }
    }

    pub fn layers(&self) -> LayerMask {
        if self.detonation.is_destroyed() {
            LayerMask::empty()
        } else {
            LayerMask::LASER_TARGET | LayerMask::SOLID | LayerMask::OCCUPANT
        }
    }
}

impl LaserTarget for Rock {
    fn on_laser_enter(&mut self, events: &mut Vec<GameEvent>) {
        if self.detonation.ignite(self.explosion_time) {
            log::debug!("Rock {} hit, exploding", self.id);
            events.push(GameEvent::Exploded {
                id: self.id,
                cell: self.cell,
            });
        }
    }

    fn on_laser_exit(&mut self, _events: &mut Vec<GameEvent>) {}
}

/// Laser tile: fires one fixed direction until destroyed
#[derive(Debug, Clone, PartialEq)]
pub struct Emitter {
    pub id: EntityId,
    pub cell: Cell,
    pub facing: Direction,
    pub detonation: Detonation,
    explosion_time: f32,
}

impl Emitter {
    pub fn new(id: EntityId, cell: Cell, facing: Direction, explosion_time: f32) -> Self {
        Self {
            id,
            cell,
            facing,
            detonation: Detonation::Intact,
            explosion_time,
        }
    }

    pub fn layers(&self) -> LayerMask {
        if self.detonation.is_destroyed() {
            LayerMask::empty()
        } else {
            LayerMask::LASER_TARGET | LayerMask::SOLID | LayerMask::OCCUPANT
        }
    }
}

impl EmitsBeams for Emitter {
    fn beam_source(&self) -> Option<BeamSource> {
        // Keeps firing through its explosion
        (!self.detonation.is_destroyed()).then(|| BeamSource {
            id: self.id,
            bounds: Aabb::from_cell(self.cell),
            kind: SourceKind::Emitter(self.facing),
        })
    }
}

impl LaserTarget for Emitter {
    fn on_laser_enter(&mut self, events: &mut Vec<GameEvent>) {
        if self.detonation.ignite(self.explosion_time) {
            log::debug!("Emitter {} hit by another beam, exploding", self.id);
            events.push(GameEvent::Exploded {
                id: self.id,
                cell: self.cell,
            });
        }
    }

    fn on_laser_exit(&mut self, _events: &mut Vec<GameEvent>) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct PowerTile {
    pub id: EntityId,
    pub cell: Cell,
    pub powered: bool,
    /// Powered state at the previous late update
    previous: bool,
    first_update: bool,
}

impl PowerTile {
    pub fn new(id: EntityId, cell: Cell) -> Self {
        Self {
            id,
            cell,
            powered: false,
            previous: false,
            first_update: true,
        }
    }

    pub fn layers(&self) -> LayerMask {
        LayerMask::LASER_TARGET | LayerMask::OCCUPANT
    }

    /// Cue a power change since the last update. The state a level loads in
    /// is never cued.
    pub fn late_update(&mut self, events: &mut Vec<GameEvent>) {
        if self.first_update {
            self.first_update = false;
        } else if self.powered != self.previous {
            events.push(if self.powered {
                GameEvent::PowerOn { id: self.id }
            } else {
                GameEvent::PowerOff { id: self.id }
            });
        }
        self.previous = self.powered;
    }
}

impl LaserTarget for PowerTile {
    fn on_laser_enter(&mut self, _events: &mut Vec<GameEvent>) {
        self.powered = true;
    }

    fn on_laser_exit(&mut self, _events: &mut Vec<GameEvent>) {
        self.powered = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WinTile {
    pub id: EntityId,
    pub cell: Cell,
    pub active: bool,
}

impl WinTile {
    pub fn new(id: EntityId, cell: Cell) -> Self {
        Self {
            id,
            cell,
            active: false,
        }
    }

    pub fn layers(&self) -> LayerMask {
        LayerMask::OCCUPANT
    }

    /// Active iff every power tile is powered (vacuously true with none)
    pub fn update<'a>(&mut self, power: impl IntoIterator<Item = &'a PowerTile>) {
        let active = power.into_iter().all(|p| p.powered);
        if active != self.active {
            log::info!(
                "Win tile {} {}",
                self.id,
                if active { "activated" } else { "deactivated" }
            );
        }
        self.active = active;
    }
}

/// Reflector tiles only need to be lit to fire; nothing else reacts
impl LaserTarget for PlacedTile {
    fn on_laser_enter(&mut self, _events: &mut Vec<GameEvent>) {}
    fn on_laser_exit(&mut self, _events: &mut Vec<GameEvent>) {}
}

impl EmitsBeams for PlacedTile {
    /// Settled reflectors only. A growing or shrinking reflector still
    /// stops beams but does not pass them on.
    fn beam_source(&self) -> Option<BeamSource> {
        (self.kind == TileKind::Reflector && !self.is_transitioning()).then(|| BeamSource {
            id: self.id,
            bounds: Aabb::from_cell(self.cell),
            kind: SourceKind::Reflector,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;

    #[test]
    fn test_rock_explodes_once() {
        let mut rock = Rock::new(EntityId(1), IVec2::new(2, 2), 0.5);
        let mut events = Vec::new();
        rock.on_laser_enter(&mut events);
        rock.on_laser_enter(&mut events);
        assert_eq!(events.len(), 1);

        assert!(!rock.detonation.update(0.3));
        assert!(rock.detonation.update(0.3));
        assert!(rock.layers().is_empty());
        assert!(!rock.detonation.update(0.3));
    }

    #[test]
    fn test_emitter_fires_until_destroyed() {
        let mut emitter = Emitter::new(EntityId(1), IVec2::ZERO, Direction::Right, 0.5);
        assert!(emitter.beam_source().is_some());

        let mut events = Vec::new();
        emitter.on_laser_enter(&mut events);
        assert!(emitter.beam_source().is_some());

        emitter.detonation.update(1.0);
        assert!(emitter.beam_source().is_none());
        assert!(emitter.layers().is_empty());
    }

    #[test]
    fn test_power_tile_first_update_is_silent() {
        let mut power = PowerTile::new(EntityId(1), IVec2::ZERO);
        let mut events = Vec::new();

        power.on_laser_enter(&mut events);
        power.late_update(&mut events);
        assert!(events.is_empty());

        power.on_laser_exit(&mut events);
        power.late_update(&mut events);
        assert_eq!(events, vec![GameEvent::PowerOff { id: EntityId(1) }]);

        events.clear();
        power.late_update(&mut events);
        assert!(events.is_empty());

        power.on_laser_enter(&mut events);
        power.late_update(&mut events);
        assert_eq!(events, vec![GameEvent::PowerOn { id: EntityId(1) }]);
    }

    #[test]
    fn test_only_settled_reflectors_fire() {
        let mut tile = PlacedTile::new(EntityId(3), TileKind::Reflector, IVec2::ONE, 0.25);
        assert!(tile.beam_source().is_none());
        tile.transition.advance(0.25);
        let source = tile.beam_source().expect("settled reflector fires");
        assert_eq!(source.kind, SourceKind::Reflector);

        let ground = PlacedTile::settled(EntityId(4), TileKind::Ground, IVec2::ZERO);
        assert!(ground.beam_source().is_none());
    }

    #[test]
    fn test_win_tile_follows_power() {
        let mut win = WinTile::new(EntityId(9), IVec2::ZERO);
        win.update(&Vec::<PowerTile>::new());
        assert!(win.active);

        let mut a = PowerTile::new(EntityId(1), IVec2::ZERO);
        let b = PowerTile::new(EntityId(2), IVec2::X);
        a.powered = true;
        win.update([&a, &b]);
        assert!(!win.active);

        let mut b = b;
        b.powered = true;
        win.update([&a, &b]);
        assert!(win.active);
    }
}
