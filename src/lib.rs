//! Laser Tiles - grid puzzle simulation core
//!
//! Core modules:
//! - `sim`: Deterministic simulation (beam propagation, tile support, reactors)
//! - `level`: Level description loaded from JSON
//! - `inventory`: Tile stock the player can place
//! - `settings`: Data-driven timing and beam tuning

pub mod inventory;
pub mod level;
pub mod settings;
pub mod sim;

pub use inventory::Inventory;
pub use level::{LevelError, LevelSpec};
pub use settings::{Pace, Settings};

use glam::{IVec2, Vec2};
use serde::{Deserialize, Serialize};

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Half size of a tile/object collider. Slightly under half a cell so
    /// diagonal neighbours never touch a cardinal beam.
    pub const COLLIDER_HALF_EXTENT: f32 = 0.45;
    /// Half size of the player collider
    pub const PLAYER_HALF_EXTENT: f32 = 0.3;

    /// Length of the probe used to detect objects sitting on a node
    pub const PLACEMENT_PROBE: f32 = 0.25;

    /// Distance at which a moving player snaps onto its destination
    pub const ARRIVAL_EPSILON: f32 = 0.001;

    /// Ticks between decisions in idle/demo mode
    pub const IDLE_DECISION_TICKS: u32 = 20;

    /// Largest level side, in cells
    pub const MAX_GRID_SIDE: u32 = 1024;
}

/// One of the four cardinal directions (y points up)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Left,
    Down,
    Right,
}

impl Direction {
    /// All cardinal directions, in the order reflectors try them
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Left,
        Direction::Down,
        Direction::Right,
    ];

    /// Unit grid offset
    #[inline]
    pub fn offset(self) -> IVec2 {
        match self {
            Direction::Up => IVec2::Y,
            Direction::Left => IVec2::NEG_X,
            Direction::Down => IVec2::NEG_Y,
            Direction::Right => IVec2::X,
        }
    }

    /// Unit world vector
    #[inline]
    pub fn vector(self) -> Vec2 {
        self.offset().as_vec2()
    }

}

/// World-space centre of a grid cell
#[inline]
pub fn cell_center(cell: IVec2) -> Vec2 {
    cell.as_vec2()
}

/// Grid cell containing a world-space point
#[inline]
pub fn world_to_cell(pos: Vec2) -> IVec2 {
    pos.round().as_ivec2()
}
