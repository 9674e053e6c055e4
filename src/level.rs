//! Level description
//!
//! Levels are JSON documents listing the grid size and every authored
//! object. A level is validated once when it loads and is read-only after
//! that; the running game copies what it needs into `GameState`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use glam::IVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Direction;
use crate::consts::MAX_GRID_SIDE;
use crate::sim::{Cell, TileKind};

/// Errors raised while loading or validating a level
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("failed to read level: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid level JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("level grid must be at least 1x1, got {width}x{height}")]
    EmptyGrid { width: u32, height: u32 },
    #[error("level grid {width}x{height} exceeds the {max}x{max} limit")]
    GridTooLarge { width: u32, height: u32, max: u32 },
    #[error("{what} at {cell} is outside the {width}x{height} grid")]
    OutOfBounds {
        what: &'static str,
        cell: IVec2,
        width: u32,
        height: u32,
    },
    #[error("{what} at {cell} overlaps another object on the same layer")]
    Overlap { what: &'static str, cell: IVec2 },
}

/// A tile already on the board when the level starts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSpec {
    pub cell: Cell,
    pub kind: TileKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitterSpec {
    pub cell: Cell,
    pub facing: Direction,
}

/// A bubble the player walks over to collect one tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupSpec {
    pub cell: Cell,
    pub kind: TileKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSpec {
    #[serde(default)]
    pub name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub anchors: Vec<Cell>,
    #[serde(default)]
    pub nodes: Vec<Cell>,
    #[serde(default)]
    pub tiles: Vec<TileSpec>,
    #[serde(default)]
    pub emitters: Vec<EmitterSpec>,
    #[serde(default)]
    pub rocks: Vec<Cell>,
    #[serde(default)]
    pub power_tiles: Vec<Cell>,
    #[serde(default)]
    pub win_tile: Option<Cell>,
    #[serde(default)]
    pub pickups: Vec<PickupSpec>,
    /// Where the player appears. May lie off the board.
    pub spawn: Cell,
    /// Where the player gains control
    pub start: Cell,
    #[serde(default)]
    pub inventory: BTreeMap<TileKind, u32>,
    #[serde(default)]
    pub selected: Option<TileKind>,
}

impl LevelSpec {
    pub fn from_json(json: &str) -> Result<Self, LevelError> {
        let level: Self = serde_json::from_str(json)?;
        level.validate()?;
        Ok(level)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, LevelError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let level = Self::from_json(&json)?;
        log::info!(
            "Loaded level '{}' ({}x{}) from {}",
            level.name,
            level.width,
            level.height,
            path.display()
        );
        Ok(level)
    }

    /// Built-in demo level
    pub fn demo() -> Result<Self, LevelError> {
        Self::from_json(include_str!("../levels/demo.json"))
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.y >= 0 && (cell.x as u32) < self.width && (cell.y as u32) < self.height
    }

    /// Check bounds and per-layer overlaps. Zero anchors is allowed (every
    /// placed tile is then unsupported) and only logged.
    pub fn validate(&self) -> Result<(), LevelError> {
        if self.width == 0 || self.height == 0 {
            return Err(LevelError::EmptyGrid {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > MAX_GRID_SIDE || self.height > MAX_GRID_SIDE {
            return Err(LevelError::GridTooLarge {
                width: self.width,
                height: self.height,
                max: MAX_GRID_SIDE,
            });
        }

        self.unique_in_bounds("anchor", self.anchors.iter().copied())?;
        self.unique_in_bounds("node", self.nodes.iter().copied())?;
        self.unique_in_bounds("tile", self.tiles.iter().map(|t| t.cell))?;

        // Static objects share one layer
        let objects = self
            .emitters
            .iter()
            .map(|e| ("emitter", e.cell))
            .chain(self.rocks.iter().map(|c| ("rock", *c)))
            .chain(self.power_tiles.iter().map(|c| ("power tile", *c)))
            .chain(self.win_tile.iter().map(|c| ("win tile", *c)))
            .chain(self.pickups.iter().map(|p| ("pickup", p.cell)));
        let mut seen = BTreeSet::new();
        for (what, cell) in objects {
            self.check_bounds(what, cell)?;
            if !seen.insert((cell.x, cell.y)) {
                return Err(LevelError::Overlap { what, cell });
            }
        }

        self.check_bounds("start", self.start)?;

        if self.anchors.is_empty() {
            log::warn!("Level '{}' has no anchor points", self.name);
        }
        for tile in &self.tiles {
            if !self.nodes.contains(&tile.cell) {
                log::warn!(
                    "Level '{}': {} tile at {} is not on a node",
                    self.name,
                    tile.kind.as_str(),
                    tile.cell
                );
            }
        }

        Ok(())
    }

    fn check_bounds(&self, what: &'static str, cell: Cell) -> Result<(), LevelError> {
        if self.in_bounds(cell) {
            Ok(())
        } else {
            Err(LevelError::OutOfBounds {
                what,
                cell,
                width: self.width,
                height: self.height,
            })
        }
    }

    fn unique_in_bounds(
        &self,
        what: &'static str,
        cells: impl Iterator<Item = Cell>,
    ) -> Result<(), LevelError> {
        let mut seen = BTreeSet::new();
        for cell in cells {
            self.check_bounds(what, cell)?;
            if !seen.insert((cell.x, cell.y)) {
                return Err(LevelError::Overlap { what, cell });
            }
        }
        Ok(())
    }
}
