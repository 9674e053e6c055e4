//! Tile stock the player can place
//!
//! Owned by the level state. Counts are kept per kind in a `BTreeMap` so the
//! auto-switch after using the last tile of a kind always picks the same
//! next kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sim::TileKind;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    counts: BTreeMap<TileKind, u32>,
    selected: Option<TileKind>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inventory with starting stock. Selects `selected` if given, otherwise
    /// the first kind in stock.
    pub fn with_stock(
        stock: impl IntoIterator<Item = (TileKind, u32)>,
        selected: Option<TileKind>,
    ) -> Self {
        let mut inventory = Self::new();
        for (kind, count) in stock {
            *inventory.counts.entry(kind).or_insert(0) += count;
        }
        inventory.selected = selected.or_else(|| inventory.next_available());
        inventory
    }

    pub fn count(&self, kind: TileKind) -> u32 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn selected(&self) -> Option<TileKind> {
        self.selected
    }

    pub fn select(&mut self, kind: TileKind) {
        if self.selected != Some(kind) {
            log::debug!("Selected {} tiles", kind.as_str());
            self.selected = Some(kind);
        }
    }

    /// Selected kind, if any of it is left
    pub fn peek_selected(&self) -> Option<TileKind> {
        self.selected.filter(|kind| self.count(*kind) > 0)
    }

    /// Take one tile of the selected kind. When that was the last one the
    /// selection moves to the next kind with stock.
    pub fn take_selected(&mut self) -> Option<TileKind> {
        let kind = self.peek_selected()?;
        let remaining = self.counts.get_mut(&kind)?;
        *remaining -= 1;

        if *remaining == 0 {
            if let Some(next) = self.next_available() {
                log::debug!("Out of {} tiles, switching to {}", kind.as_str(), next.as_str());
                self.selected = Some(next);
            }
        }
        Some(kind)
    }

    /// Return a tile. `reselect` makes its kind the selection.
    pub fn add(&mut self, kind: TileKind, reselect: bool) {
        *self.counts.entry(kind).or_insert(0) += 1;
        if reselect {
            self.select(kind);
        }
    }

    /// Kinds with stock, in stable order
    pub fn available(&self) -> impl Iterator<Item = (TileKind, u32)> + '_ {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(kind, count)| (*kind, *count))
    }

    fn next_available(&self) -> Option<TileKind> {
        self.available().map(|(kind, _)| kind).next()
    }
}
