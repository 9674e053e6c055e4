//! Placeable tiles and their grow/shrink transitions
//!
//! A transition is a resumable task advanced by the fixed timestep. While it
//! runs the tile still occupies its cell, but it is invisible to support and
//! connectivity checks.

use serde::{Deserialize, Serialize};

use super::EntityId;
use super::grid::Cell;
use super::query::LayerMask;

/// Tile types the player can place
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum TileKind {
    #[default]
    Normal,
    Ground,
    Blocker,
    Reflector,
}

impl TileKind {
    pub const ALL: [TileKind; 4] = [
        TileKind::Normal,
        TileKind::Ground,
        TileKind::Blocker,
        TileKind::Reflector,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TileKind::Normal => "Normal",
            TileKind::Ground => "Ground",
            TileKind::Blocker => "Blocker",
            TileKind::Reflector => "Reflector",
        }
    }

    /// Collider layers for a tile of this kind
    pub fn layers(&self) -> LayerMask {
        match self {
            TileKind::Normal | TileKind::Ground => LayerMask::empty(),
            TileKind::Blocker => LayerMask::LASER_BLOCKER | LayerMask::SOLID,
            TileKind::Reflector => LayerMask::LASER_TARGET | LayerMask::SOLID,
        }
    }
}

/// Durations of the placement/removal animations (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionTiming {
    pub grow_time: f32,
    pub shrink_time: f32,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            grow_time: 0.25,
            shrink_time: 0.5,
        }
    }
}

/// Placement/removal animation state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Transition {
    /// Being placed
    Growing { elapsed: f32, duration: f32 },
    /// Fully placed
    Settled,
    /// Being removed. `reselect` marks a direct removal whose kind becomes the
    /// selected inventory slot once the tile is gone (cascades never reselect).
    Shrinking {
        elapsed: f32,
        duration: f32,
        reselect: bool,
    },
}

/// Outcome of advancing a transition by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionStep {
    Idle,
    Running,
    Grown,
    Shrunk { reselect: bool },
}

impl Transition {
    pub fn growing(duration: f32) -> Self {
        if duration <= 0.0 {
            Transition::Settled
        } else {
            Transition::Growing {
                elapsed: 0.0,
                duration,
            }
        }
    }

    pub fn shrinking(duration: f32, reselect: bool) -> Self {
        Transition::Shrinking {
            elapsed: 0.0,
            duration: duration.max(0.0),
            reselect,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Transition::Settled)
    }

    pub fn advance(&mut self, dt: f32) -> TransitionStep {
        match self {
            Transition::Settled => TransitionStep::Idle,
            Transition::Growing { elapsed, duration } => {
                *elapsed += dt;
                if *elapsed >= *duration {
                    *self = Transition::Settled;
                    TransitionStep::Grown
                } else {
                    TransitionStep::Running
                }
            }
            Transition::Shrinking {
                elapsed,
                duration,
                reselect,
            } => {
                *elapsed += dt;
                if *elapsed >= *duration {
                    TransitionStep::Shrunk {
                        reselect: *reselect,
                    }
                } else {
                    TransitionStep::Running
                }
            }
        }
    }

}

/// A tile placed on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedTile {
    pub id: EntityId,
    pub kind: TileKind,
    pub cell: Cell,
    pub transition: Transition,
}

impl PlacedTile {
    /// Freshly placed tile, starting its grow animation
    pub fn new(id: EntityId, kind: TileKind, cell: Cell, grow_time: f32) -> Self {
        Self {
            id,
            kind,
            cell,
            transition: Transition::growing(grow_time),
        }
    }

    /// Tile that is already part of the level when it loads
    pub fn settled(id: EntityId, kind: TileKind, cell: Cell) -> Self {
        Self {
            id,
            kind,
            cell,
            transition: Transition::Settled,
        }
    }

    #[inline]
    pub fn is_transitioning(&self) -> bool {
        self.transition.is_active()
    }

    pub fn is_shrinking(&self) -> bool {
        matches!(self.transition, Transition::Shrinking { .. })
    }

    /// Start the removal animation. Ignored while any transition is in
    /// flight, so an in-progress shrink is never restarted.
    pub fn trigger_remove(&mut self, shrink_time: f32, reselect: bool) -> bool {
        if self.is_transitioning() {
            return false;
        }
        self.transition = Transition::shrinking(shrink_time, reselect);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;

    #[test]
    fn test_grow_then_settle() {
        let mut tile = PlacedTile::new(EntityId(1), TileKind::Ground, IVec2::ZERO, 0.25);
        assert!(tile.is_transitioning());
        assert_eq!(tile.transition.advance(0.1), TransitionStep::Running);
        assert_eq!(tile.transition.advance(0.2), TransitionStep::Grown);
        assert!(!tile.is_transitioning());
        assert_eq!(tile.transition.advance(0.1), TransitionStep::Idle);
    }

    #[test]
    fn test_zero_grow_time_is_settled() {
        let tile = PlacedTile::new(EntityId(1), TileKind::Ground, IVec2::ZERO, 0.0);
        assert!(!tile.is_transitioning());
    }

    #[test]
    fn test_remove_ignored_while_transitioning() {
        let mut tile = PlacedTile::new(EntityId(1), TileKind::Blocker, IVec2::ZERO, 0.25);
        assert!(!tile.trigger_remove(0.5, true));

        tile.transition = Transition::Settled;
        assert!(tile.trigger_remove(0.5, false));
        assert!(tile.is_shrinking());

        // Second request does not restart the shrink
        tile.transition.advance(0.3);
        assert!(!tile.trigger_remove(0.5, true));
        assert_eq!(
            tile.transition.advance(0.3),
            TransitionStep::Shrunk { reselect: false }
        );
    }

    #[test]
    fn test_kind_layers() {
        assert!(TileKind::Ground.layers().is_empty());
        assert!(TileKind::Reflector.layers().contains(LayerMask::LASER_TARGET));
        assert!(TileKind::Blocker.layers().contains(LayerMask::LASER_BLOCKER));
        assert!(!TileKind::Blocker.layers().contains(LayerMask::LASER_TARGET));
    }
}
