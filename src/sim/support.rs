//! Tile placement and structural support
//!
//! Placed tiles must stay connected, through 4-adjacent settled tiles, to a
//! cell next to an anchor point. When a removal breaks that connection every
//! tile of the orphaned component starts its removal animation (a cascade).
//! Tiles that are growing or shrinking are invisible to this computation.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use super::EntityId;
use super::grid::{Cell, GridLayer};
use super::tile::{PlacedTile, TileKind, Transition, TransitionStep, TransitionTiming};
use crate::Direction;

/// Fixed support source. Never removed during a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorPoint;

/// Empty slot the player clicks to place a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileNode {
    /// False while a tile or a static object sits on the node
    pub active: bool,
}

/// Notifications for inventory/UI/audio, fired once per event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    Placed {
        id: EntityId,
        kind: TileKind,
        cell: Cell,
    },
    /// A tile lost its support and started shrinking
    Cascaded {
        id: EntityId,
        kind: TileKind,
        cell: Cell,
    },
    Removed {
        id: EntityId,
        kind: TileKind,
        cell: Cell,
        reselect: bool,
    },
}

/// The three grid layers plus the placed tiles themselves
#[derive(Debug, Clone)]
pub struct TileBoard {
    tiles: GridLayer<EntityId>,
    anchors: GridLayer<AnchorPoint>,
    nodes: GridLayer<TileNode>,
    placed: BTreeMap<EntityId, PlacedTile>,
    timing: TransitionTiming,
    events: Vec<BoardEvent>,
}

impl TileBoard {
    pub fn new(width: u32, height: u32, timing: TransitionTiming) -> Self {
        Self {
            tiles: GridLayer::new(width, height),
            anchors: GridLayer::new(width, height),
            nodes: GridLayer::new(width, height),
            placed: BTreeMap::new(),
            timing,
            events: Vec::new(),
        }
    }

    pub fn timing(&self) -> TransitionTiming {
        self.timing
    }

    pub fn add_anchor(&mut self, cell: Cell) -> bool {
        self.anchors.insert(cell, AnchorPoint)
    }

    pub fn add_node(&mut self, cell: Cell) -> bool {
        self.nodes.insert(cell, TileNode { active: true })
    }

    pub fn has_anchor(&self, cell: Cell) -> bool {
        self.anchors.is_occupied(cell)
    }

    pub fn node(&self, cell: Cell) -> Option<&TileNode> {
        self.nodes.get(cell)
    }

    pub fn set_node_active(&mut self, cell: Cell, active: bool) {
        if let Some(node) = self.nodes.get_mut(cell) {
            node.active = active;
        }
    }

    pub fn tile_at(&self, cell: Cell) -> Option<&PlacedTile> {
        self.tiles.get(cell).and_then(|id| self.placed.get(id))
    }

    pub fn tile(&self, id: EntityId) -> Option<&PlacedTile> {
        self.placed.get(&id)
    }

    pub fn tile_mut(&mut self, id: EntityId) -> Option<&mut PlacedTile> {
        self.placed.get_mut(&id)
    }

    /// Placed tiles ordered by id
    pub fn tiles(&self) -> impl Iterator<Item = &PlacedTile> {
        self.placed.values()
    }

    pub fn tile_count(&self) -> usize {
        self.placed.len()
    }

    /// True when a tile may be placed on `cell`: the cell holds no tile and
    /// an anchor or another tile is 4-adjacent.
    pub fn can_place(&self, cell: Cell) -> bool {
        if !self.tiles.in_bounds(cell) || self.tiles.is_occupied(cell) {
            return false;
        }
        self.anchors.has_neighbor(cell) || self.tiles.has_neighbor(cell)
    }

    /// Cells where `can_place` holds and the node is free
    pub fn placeable_cells(&self) -> Vec<Cell> {
        self.nodes
            .iter()
            .filter(|(cell, node)| node.active && self.can_place(*cell))
            .map(|(cell, _)| cell)
            .collect()
    }

    /// Insert a tile. Callers confirm `can_place` first.
    pub fn place(&mut self, tile: PlacedTile) {
        let (id, kind, cell) = (tile.id, tile.kind, tile.cell);
        if !self.tiles.insert(cell, id) {
            log::warn!("Tile {} placed outside the grid at {}", id, cell);
            return;
        }
        if let Some(previous) = self.placed.insert(id, tile) {
            // Same id re-placed elsewhere: drop the stale grid entry
            if previous.cell != cell {
                self.tiles.remove(previous.cell);
            }
        }
        self.set_node_active(cell, false);
        log::debug!("Placed {} tile {} at {}", kind.as_str(), id, cell);
        self.events.push(BoardEvent::Placed { id, kind, cell });
    }

    /// Start removing the tile on `cell`. Returns false when there is no
    /// tile or it is already transitioning.
    pub fn trigger_remove(&mut self, cell: Cell, reselect: bool) -> bool {
        let shrink_time = self.timing.shrink_time;
        let Some(id) = self.tiles.get(cell).copied() else {
            return false;
        };
        self.placed
            .get_mut(&id)
            .is_some_and(|tile| tile.trigger_remove(shrink_time, reselect))
    }

    /// Clear `cell`, free its node and re-check support for what remains
    pub fn remove(&mut self, cell: Cell) -> Option<PlacedTile> {
        let removed = self
            .tiles
            .remove(cell)
            .and_then(|id| self.placed.remove(&id));

        // The node comes back even if the tile was already gone
        self.set_node_active(cell, true);

        if let Some(tile) = &removed {
            let reselect = match tile.transition {
                Transition::Shrinking { reselect, .. } => reselect,
                _ => false,
            };
            log::debug!("Removed {} tile {} at {}", tile.kind.as_str(), tile.id, cell);
            self.events.push(BoardEvent::Removed {
                id: tile.id,
                kind: tile.kind,
                cell,
                reselect,
            });
        }

        self.validate_support();
        removed
    }

    /// Cascade-remove every settled component with no path to an anchor.
    /// Returns the ids that started shrinking, in id order.
    pub fn validate_support(&mut self) -> Vec<EntityId> {
        if self.anchors.is_empty() {
            log::warn!("Level has no anchor points: every placed tile is unsupported");
        }

        let mut seen: BTreeSet<EntityId> = BTreeSet::new();
        let mut doomed: Vec<EntityId> = Vec::new();

        let candidates: Vec<(EntityId, Cell)> = self
            .placed
            .values()
            .filter(|tile| !tile.is_transitioning())
            .map(|tile| (tile.id, tile.cell))
            .collect();

        for (id, cell) in candidates {
            if seen.contains(&id) {
                continue;
            }

            let component = self.connected_component(cell);
            let members: Vec<EntityId> = component
                .iter()
                .filter_map(|c| self.tiles.get(*c).copied())
                .collect();
            seen.extend(members.iter().copied());

            let anchored = component.iter().any(|c| self.anchors.has_neighbor(*c));
            log::debug!(
                "Support: component of {} from {} has {} tiles, anchored={}",
                id,
                cell,
                component.len(),
                anchored
            );

            if !anchored {
                doomed.extend(members);
            }
        }

        doomed.sort();
        doomed.dedup();

        let shrink_time = self.timing.shrink_time;
        let mut cascaded = Vec::with_capacity(doomed.len());
        for id in doomed {
            let Some(tile) = self.placed.get_mut(&id) else {
                continue;
            };
            if tile.trigger_remove(shrink_time, false) {
                self.events.push(BoardEvent::Cascaded {
                    id,
                    kind: tile.kind,
                    cell: tile.cell,
                });
                cascaded.push(id);
            }
        }

        if !cascaded.is_empty() {
            log::info!("Support lost: cascading {} tiles", cascaded.len());
        }
        cascaded
    }

    /// Breadth-first 4-connected component of settled tiles containing
    /// `start` (itself included). Empty when `start` holds no settled tile.
    pub fn connected_component(&self, start: Cell) -> Vec<Cell> {
        let mut visited: BTreeSet<(i32, i32)> = BTreeSet::new();
        let mut component = Vec::new();
        let mut queue = VecDeque::new();

        if !self.is_settled_tile(start) {
            return component;
        }

        visited.insert((start.x, start.y));
        queue.push_back(start);

        while let Some(cell) = queue.pop_front() {
            component.push(cell);
            for dir in Direction::ALL {
                let neighbor = cell + dir.offset();
                if visited.contains(&(neighbor.x, neighbor.y)) {
                    continue;
                }
                if self.is_settled_tile(neighbor) {
                    visited.insert((neighbor.x, neighbor.y));
                    queue.push_back(neighbor);
                }
            }
        }

        component
    }

    /// True when some settled tile of the component around `cell` touches
    /// an anchor
    pub fn is_supported(&self, cell: Cell) -> bool {
        self.connected_component(cell)
            .iter()
            .any(|c| self.anchors.has_neighbor(*c))
    }

    fn is_settled_tile(&self, cell: Cell) -> bool {
        self.tile_at(cell).is_some_and(|tile| !tile.is_transitioning())
    }

    /// Advance every transition. Finished shrinks are removed (lowest id
    /// first), which re-validates support and may start new cascades. A tile
    /// that settles joins the support computation, so support is checked
    /// again for it: it may have been placed beside a tile that was already
    /// shrinking.
    pub fn advance(&mut self, dt: f32) {
        let mut finished: Vec<Cell> = Vec::new();
        let mut settled = false;
        for tile in self.placed.values_mut() {
            match tile.transition.advance(dt) {
                TransitionStep::Shrunk { .. } => finished.push(tile.cell),
                TransitionStep::Grown => {
                    log::debug!("Tile {} settled at {}", tile.id, tile.cell);
                    settled = true;
                }
                TransitionStep::Idle | TransitionStep::Running => {}
            }
        }

        if finished.is_empty() {
            if settled {
                self.validate_support();
            }
            return;
        }
        for cell in finished {
            self.remove(cell);
        }
    }

    pub fn drain_events(&mut self) -> Vec<BoardEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;

    fn board(width: u32, height: u32) -> TileBoard {
        let mut board = TileBoard::new(width, height, TransitionTiming::default());
        for x in 0..width as i32 {
            for y in 0..height as i32 {
                board.add_node(IVec2::new(x, y));
            }
        }
        board
    }

    fn place_settled(board: &mut TileBoard, id: u32, x: i32, y: i32) {
        board.place(PlacedTile::settled(
            EntityId(id),
            TileKind::Ground,
            IVec2::new(x, y),
        ));
    }

    #[test]
    fn test_can_place_requires_adjacency() {
        let mut b = board(7, 7);
        b.add_anchor(IVec2::new(4, 0));

        assert!(b.can_place(IVec2::new(4, 1)));
        assert!(b.can_place(IVec2::new(3, 0)));
        // Diagonal to the anchor only
        assert!(!b.can_place(IVec2::new(3, 1)));
        // Nothing nearby
        assert!(!b.can_place(IVec2::new(0, 6)));
        // Outside the grid
        assert!(!b.can_place(IVec2::new(4, -1)));
    }

    #[test]
    fn test_can_place_rejects_occupied_cell() {
        let mut b = board(7, 7);
        b.add_anchor(IVec2::new(4, 0));
        place_settled(&mut b, 1, 4, 1);
        place_settled(&mut b, 2, 4, 2);

        assert!(!b.can_place(IVec2::new(4, 1)));
        // Tiles extend placement reach
        assert!(b.can_place(IVec2::new(4, 3)));
        assert!(b.can_place(IVec2::new(5, 2)));
    }

    #[test]
    fn test_place_disables_node_and_remove_restores_it() {
        let mut b = board(3, 3);
        b.add_anchor(IVec2::new(0, 0));
        place_settled(&mut b, 1, 0, 1);
        assert!(!b.node(IVec2::new(0, 1)).unwrap().active);

        let removed = b.remove(IVec2::new(0, 1)).unwrap();
        assert_eq!(removed.id, EntityId(1));
        assert!(b.node(IVec2::new(0, 1)).unwrap().active);
        assert!(b.tile_at(IVec2::new(0, 1)).is_none());
    }

    #[test]
    fn test_tile_next_to_anchor_supports_itself() {
        let mut b = board(7, 7);
        b.add_anchor(IVec2::new(4, 0));
        place_settled(&mut b, 1, 4, 1);

        assert!(b.validate_support().is_empty());
        assert!(!b.tile(EntityId(1)).unwrap().is_transitioning());
    }

    #[test]
    fn test_cascade_after_removing_chain_root() {
        let mut b = board(7, 7);
        b.add_anchor(IVec2::new(0, 0));
        place_settled(&mut b, 1, 0, 1);
        place_settled(&mut b, 2, 0, 2);
        place_settled(&mut b, 3, 0, 3);
        b.drain_events();

        b.remove(IVec2::new(0, 1));

        assert!(b.tile_at(IVec2::new(0, 1)).is_none());
        assert!(b.tile(EntityId(2)).unwrap().is_shrinking());
        assert!(b.tile(EntityId(3)).unwrap().is_shrinking());

        let events = b.drain_events();
        let cascaded: Vec<EntityId> = events
            .iter()
            .filter_map(|e| match e {
                BoardEvent::Cascaded { id, .. } => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(cascaded, vec![EntityId(2), EntityId(3)]);
        assert!(matches!(
            events[0],
            BoardEvent::Removed {
                id: EntityId(1),
                ..
            }
        ));
    }

    #[test]
    fn test_cascade_keeps_other_supported_branch() {
        let mut b = board(7, 7);
        b.add_anchor(IVec2::new(0, 0));
        b.add_anchor(IVec2::new(6, 0));
        // Two arms joined across the top row
        place_settled(&mut b, 1, 0, 1);
        place_settled(&mut b, 2, 1, 1);
        place_settled(&mut b, 3, 2, 1);
        place_settled(&mut b, 4, 6, 1);
        place_settled(&mut b, 5, 5, 1);

        b.remove(IVec2::new(0, 1));
        // (1,1)-(2,1) lost support, (5,1)-(6,1) still anchored
        assert!(b.tile(EntityId(2)).unwrap().is_shrinking());
        assert!(b.tile(EntityId(3)).unwrap().is_shrinking());
        assert!(!b.tile(EntityId(4)).unwrap().is_transitioning());
        assert!(!b.tile(EntityId(5)).unwrap().is_transitioning());
    }

    #[test]
    fn test_transitioning_tiles_do_not_carry_support() {
        let mut b = board(7, 7);
        b.add_anchor(IVec2::new(0, 0));
        // Growing tile next to the anchor
        b.place(PlacedTile::new(
            EntityId(1),
            TileKind::Ground,
            IVec2::new(0, 1),
            0.25,
        ));
        place_settled(&mut b, 2, 0, 2);

        let cascaded = b.validate_support();
        assert_eq!(cascaded, vec![EntityId(2)]);
        // The growing tile is neither support nor dependent
        assert!(matches!(
            b.tile(EntityId(1)).unwrap().transition,
            Transition::Growing { .. }
        ));
    }

    #[test]
    fn test_in_flight_shrink_is_not_retriggered() {
        let mut b = board(5, 5);
        b.add_anchor(IVec2::new(0, 0));
        place_settled(&mut b, 1, 0, 1);
        place_settled(&mut b, 2, 0, 2);
        assert!(b.trigger_remove(IVec2::new(0, 2), true));
        b.advance(0.2);

        // Re-validation must not restart the removal
        assert!(b.validate_support().is_empty());
        assert!(!b.trigger_remove(IVec2::new(0, 2), false));
        match b.tile(EntityId(2)).unwrap().transition {
            Transition::Shrinking {
                elapsed, reselect, ..
            } => {
                assert!((elapsed - 0.2).abs() < 1e-6);
                assert!(reselect);
            }
            other => panic!("expected shrinking, got {:?}", other),
        }
    }

    #[test]
    fn test_advance_finishes_shrink_and_cascades() {
        let mut b = board(5, 5);
        b.add_anchor(IVec2::new(0, 0));
        place_settled(&mut b, 1, 0, 1);
        place_settled(&mut b, 2, 0, 2);
        b.drain_events();

        assert!(b.trigger_remove(IVec2::new(0, 1), true));
        b.advance(0.6);

        assert!(b.tile(EntityId(1)).is_none());
        assert!(b.tile(EntityId(2)).unwrap().is_shrinking());
        let events = b.drain_events();
        assert!(events.contains(&BoardEvent::Removed {
            id: EntityId(1),
            kind: TileKind::Ground,
            cell: IVec2::new(0, 1),
            reselect: true,
        }));

        b.advance(0.6);
        assert_eq!(b.tile_count(), 0);
        let events = b.drain_events();
        assert!(events.contains(&BoardEvent::Removed {
            id: EntityId(2),
            kind: TileKind::Ground,
            cell: IVec2::new(0, 2),
            reselect: false,
        }));
    }

    #[test]
    fn test_tile_grown_beside_shrinking_tile_is_rechecked() {
        let mut b = board(5, 5);
        b.add_anchor(IVec2::new(0, 0));
        place_settled(&mut b, 1, 0, 1);
        assert!(b.trigger_remove(IVec2::new(0, 1), true));
        b.advance(0.4);

        // The shrinking tile still counts as a neighbour for placement
        assert!(b.can_place(IVec2::new(0, 2)));
        b.place(PlacedTile::new(
            EntityId(2),
            TileKind::Ground,
            IVec2::new(0, 2),
            0.25,
        ));

        // Tile 1 disappears while tile 2 is still growing
        b.advance(0.2);
        assert!(b.tile(EntityId(1)).is_none());
        assert!(matches!(
            b.tile(EntityId(2)).unwrap().transition,
            Transition::Growing { .. }
        ));
        b.drain_events();

        // Once grown it has nothing to lean on
        b.advance(0.2);
        assert!(b.tile(EntityId(2)).unwrap().is_shrinking());
        assert!(b.drain_events().contains(&BoardEvent::Cascaded {
            id: EntityId(2),
            kind: TileKind::Ground,
            cell: IVec2::new(0, 2),
        }));

        b.advance(0.6);
        assert_eq!(b.tile_count(), 0);
    }

    #[test]
    fn test_supported_tile_settles_in_place() {
        let mut b = board(5, 5);
        b.add_anchor(IVec2::new(0, 0));
        b.place(PlacedTile::new(
            EntityId(1),
            TileKind::Ground,
            IVec2::new(0, 1),
            0.25,
        ));
        b.advance(0.3);
        assert_eq!(
            b.tile(EntityId(1)).unwrap().transition,
            Transition::Settled
        );
    }

    #[test]
    fn test_no_anchors_means_nothing_is_supported() {
        let mut b = board(3, 3);
        place_settled(&mut b, 1, 1, 1);
        place_settled(&mut b, 2, 1, 2);
        assert_eq!(b.validate_support(), vec![EntityId(1), EntityId(2)]);
    }

    #[test]
    fn test_placeable_cells_skip_inactive_nodes() {
        let mut b = board(3, 3);
        b.add_anchor(IVec2::new(0, 0));
        b.set_node_active(IVec2::new(1, 0), false);
        let cells = b.placeable_cells();
        assert!(cells.contains(&IVec2::new(0, 1)));
        assert!(!cells.contains(&IVec2::new(1, 0)));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// After validation every settled tile is connected to an anchor
            #[test]
            fn settled_tiles_are_supported_after_validation(
                anchors in proptest::collection::vec((0i32..6, 0i32..6), 0..3),
                tiles in proptest::collection::vec((0i32..6, 0i32..6), 0..20),
            ) {
                let mut b = board(6, 6);
                for (x, y) in &anchors {
                    b.add_anchor(IVec2::new(*x, *y));
                }
                for (i, (x, y)) in tiles.iter().enumerate() {
                    let cell = IVec2::new(*x, *y);
                    if b.tile_at(cell).is_none() {
                        b.place(PlacedTile::settled(EntityId(i as u32 + 1), TileKind::Ground, cell));
                    }
                }

                let cascaded = b.validate_support();
                let settled: Vec<Cell> = b
                    .tiles()
                    .filter(|t| !t.is_transitioning())
                    .map(|t| t.cell)
                    .collect();
                for cell in settled {
                    prop_assert!(b.is_supported(cell));
                }
                // Cascaded tiles were never supported: running again is a no-op
                prop_assert!(b.validate_support().is_empty());
                for id in cascaded {
                    prop_assert!(b.tile(id).unwrap().is_shrinking());
                }
            }

            /// Placements, removals and partial advances in any order leave
            /// only supported tiles once every transition has finished
            #[test]
            fn supported_after_transitions_finish(
                anchors in proptest::collection::vec((0i32..6, 0i32..6), 1..3),
                ops in proptest::collection::vec((0u8..3, 0i32..6, 0i32..6, 1u32..30), 1..60),
            ) {
                let mut b = board(6, 6);
                for (x, y) in &anchors {
                    b.add_anchor(IVec2::new(*x, *y));
                }
                let mut next_id = 1;
                for (op, x, y, ticks) in ops {
                    let cell = IVec2::new(x, y);
                    match op {
                        0 => {
                            if b.can_place(cell) {
                                b.place(PlacedTile::new(EntityId(next_id), TileKind::Ground, cell, 0.25));
                                next_id += 1;
                            }
                        }
                        1 => {
                            b.trigger_remove(cell, true);
                        }
                        _ => b.advance(ticks as f32 / 60.0),
                    }
                }

                for _ in 0..10 {
                    b.advance(0.5);
                }
                for tile in b.tiles() {
                    prop_assert!(!tile.is_transitioning());
                    prop_assert!(b.is_supported(tile.cell));
                }
            }
        }
    }
}
