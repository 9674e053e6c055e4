//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, audio or platform dependencies

pub mod beam;
pub mod grid;
pub mod player;
pub mod query;
pub mod reactor;
pub mod state;
pub mod support;
pub mod tick;
pub mod tile;

use serde::{Deserialize, Serialize};

pub use beam::{
    BeamEngine, BeamSegment, BeamSource, BeamTransitions, EmitsBeams, ResolveStats, SourceKind,
};
pub use grid::{Cell, GridLayer};
pub use player::{Footing, Player, PlayerState, PlayerTuning};
pub use query::{Aabb, Collider, ColliderSet, Hit, LayerMask, SpatialQuery};
pub use reactor::{Detonation, Emitter, LaserTarget, PowerTile, Rock, WinTile};
pub use state::{GameEvent, GamePhase, GameState, Pickup, TickCycle};
pub use support::{AnchorPoint, BoardEvent, TileBoard, TileNode};
pub use tick::{TickInput, tick};
pub use tile::{PlacedTile, TileKind, Transition, TransitionStep, TransitionTiming};

/// Stable identity of a simulation entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
