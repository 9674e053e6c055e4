//! Game state for one level
//!
//! Everything the tick mutates lives here: the tile board, the beam engine,
//! reactors, the player, the inventory and the global blink cycle. Nothing is
//! global; two states never share anything.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::EntityId;
use super::beam::{BeamEngine, BeamSource, EmitsBeams};
use super::grid::Cell;
use super::player::{Footing, Player};
use super::query::{Aabb, ColliderSet, LayerMask, SpatialQuery};
use super::reactor::{Emitter, LaserTarget, PowerTile, Rock, WinTile};
use super::support::{BoardEvent, TileBoard};
use super::tile::{PlacedTile, TileKind};
use crate::consts::PLACEMENT_PROBE;
use crate::inventory::Inventory;
use crate::level::LevelSpec;
use crate::settings::Settings;
use crate::cell_center;

/// Current phase of the level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    Playing,
    /// The player reached an active win tile. Ticks do nothing.
    Cleared,
}

/// Notifications for UI, audio and logging. Each one fires exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    LaserEnter { id: EntityId },
    LaserExit { id: EntityId },
    TilePlaced { id: EntityId, kind: TileKind, cell: Cell },
    TileRemoved { id: EntityId, kind: TileKind, cell: Cell },
    TileCascaded { id: EntityId, kind: TileKind, cell: Cell },
    PlacementRefused { cell: Cell },
    Exploded { id: EntityId, cell: Cell },
    PowerOn { id: EntityId },
    PowerOff { id: EntityId },
    PickupCollected { id: EntityId, kind: TileKind },
    PlayerFell { id: EntityId, cell: Cell },
    PlayerBurned { id: EntityId, cell: Cell },
    PlayerRespawned { id: EntityId },
    LevelCleared,
}

/// A floating tile the player collects by standing on it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pickup {
    pub id: EntityId,
    pub cell: Cell,
    pub kind: TileKind,
}

/// Global blink flag flipped every `delay` seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickCycle {
    pub on: bool,
    elapsed: f32,
    delay: f32,
}

impl TickCycle {
    pub fn new(delay: f32) -> Self {
        Self {
            on: false,
            elapsed: 0.0,
            delay,
        }
    }

    /// Returns true when the flag flipped this step
    pub fn advance(&mut self, dt: f32) -> bool {
        if self.delay <= 0.0 {
            return false;
        }
        self.elapsed += dt;
        if self.elapsed >= self.delay {
            self.elapsed -= self.delay;
            self.on = !self.on;
            return true;
        }
        false
    }
}

/// Complete state of a running level
#[derive(Debug, Clone)]
pub struct GameState {
    pub name: String,
    /// Seed for the idle demo RNG
    pub seed: u64,
    pub rng: Pcg32,
    pub settings: Settings,
    /// Simulation tick counter
    pub time_ticks: u64,
    pub phase: GamePhase,
    pub board: TileBoard,
    pub beams: BeamEngine,
    /// Rebuilt from the entities whenever they may have moved
    pub colliders: ColliderSet,
    pub inventory: Inventory,
    /// Sorted by id for deterministic iteration
    pub emitters: Vec<Emitter>,
    pub rocks: Vec<Rock>,
    pub power_tiles: Vec<PowerTile>,
    pub win_tile: Option<WinTile>,
    pub pickups: Vec<Pickup>,
    pub player: Player,
    pub cycle: TickCycle,
    events: Vec<GameEvent>,
    next_id: u32,
}

impl GameState {
    /// Build the running state of `level`. The level must already be
    /// validated (`LevelSpec::from_json` does that).
    pub fn new(level: &LevelSpec, settings: Settings, seed: u64) -> Self {
        let mut next_id = 1;
        let mut alloc = || {
            let id = EntityId(next_id);
            next_id += 1;
            id
        };

        let mut board = TileBoard::new(level.width, level.height, settings.timing());
        for &cell in &level.anchors {
            board.add_anchor(cell);
        }
        for &cell in &level.nodes {
            board.add_node(cell);
        }
        for tile in &level.tiles {
            board.place(PlacedTile::settled(alloc(), tile.kind, tile.cell));
        }
        // Authored tiles are not placement events
        board.drain_events();

        let emitters: Vec<Emitter> = level
            .emitters
            .iter()
            .map(|e| Emitter::new(alloc(), e.cell, e.facing, settings.explosion_time))
            .collect();
        let rocks: Vec<Rock> = level
            .rocks
            .iter()
            .map(|&cell| Rock::new(alloc(), cell, settings.explosion_time))
            .collect();
        let power_tiles: Vec<PowerTile> = level
            .power_tiles
            .iter()
            .map(|&cell| PowerTile::new(alloc(), cell))
            .collect();
        let mut win_tile = level.win_tile.map(|cell| WinTile::new(alloc(), cell));
        let pickups: Vec<Pickup> = level
            .pickups
            .iter()
            .map(|p| Pickup {
                id: alloc(),
                cell: p.cell,
                kind: p.kind,
            })
            .collect();
        let player = Player::new(alloc(), level.spawn, level.start, settings.player_tuning());

        // Static objects sitting on a node keep tiles off it
        let blocked = emitters
            .iter()
            .map(|e| e.cell)
            .chain(rocks.iter().map(|r| r.cell))
            .chain(power_tiles.iter().map(|p| p.cell))
            .chain(win_tile.iter().map(|w| w.cell));
        for cell in blocked {
            board.set_node_active(cell, false);
        }

        for tile in board.tiles() {
            if !board.is_supported(tile.cell) {
                log::warn!(
                    "Level '{}': authored {} tile at {} has no support",
                    level.name,
                    tile.kind.as_str(),
                    tile.cell
                );
            }
        }

        if let Some(win) = win_tile.as_mut() {
            win.update(&power_tiles);
        }

        let inventory = Inventory::with_stock(
            level.inventory.iter().map(|(kind, count)| (*kind, *count)),
            level.selected,
        );

        let mut state = Self {
            name: level.name.clone(),
            seed,
            rng: Pcg32::seed_from_u64(seed),
            beams: BeamEngine::new(settings.beam_range),
            cycle: TickCycle::new(settings.cycle_delay),
            settings,
            time_ticks: 0,
            phase: GamePhase::Playing,
            board,
            colliders: ColliderSet::new(),
            inventory,
            emitters,
            rocks,
            power_tiles,
            win_tile,
            pickups,
            player,
            events: Vec::new(),
            next_id,
        };
        state.rebuild_colliders();

        log::info!(
            "Level '{}' started: {} nodes, {} emitters, {} tiles in stock (seed {})",
            state.name,
            level.nodes.len(),
            state.emitters.len(),
            state.inventory.total(),
            seed
        );
        state
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    /// Take the events raised since the last drain, in order
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Register a collider for every entity that can block or receive
    /// something this tick
    pub fn rebuild_colliders(&mut self) {
        let colliders = &mut self.colliders;
        colliders.clear();

        for tile in self.board.tiles() {
            colliders.push(tile.id, Aabb::from_cell(tile.cell), tile.kind.layers());
        }
        for emitter in &self.emitters {
            colliders.push(emitter.id, Aabb::from_cell(emitter.cell), emitter.layers());
        }
        for rock in &self.rocks {
            colliders.push(rock.id, Aabb::from_cell(rock.cell), rock.layers());
        }
        for power in &self.power_tiles {
            colliders.push(power.id, Aabb::from_cell(power.cell), power.layers());
        }
        if let Some(win) = &self.win_tile {
            colliders.push(win.id, Aabb::from_cell(win.cell), win.layers());
        }
        colliders.push(self.player.id, self.player.bounds(), self.player.layers());
    }

    /// Emitters, then reflectors, each in id order
    pub fn beam_sources(&self) -> (Vec<BeamSource>, Vec<BeamSource>) {
        let emitters = self
            .emitters
            .iter()
            .filter_map(EmitsBeams::beam_source)
            .collect();
        let reflectors = self
            .board
            .tiles()
            .filter_map(EmitsBeams::beam_source)
            .collect();
        (emitters, reflectors)
    }

    /// The entity with `id`, if it still exists and reacts to beams
    pub fn target_mut(&mut self, id: EntityId) -> Option<&mut dyn LaserTarget> {
        if self.player.id == id {
            return Some(&mut self.player);
        }
        if let Some(emitter) = self.emitters.iter_mut().find(|e| e.id == id) {
            return Some(emitter);
        }
        if let Some(rock) = self.rocks.iter_mut().find(|r| r.id == id) {
            return Some(rock);
        }
        if let Some(power) = self.power_tiles.iter_mut().find(|p| p.id == id) {
            return Some(power);
        }
        self.board
            .tile_mut(id)
            .map(|tile| tile as &mut dyn LaserTarget)
    }

    /// What the player would stand on at `cell`
    pub fn footing(&self, cell: Cell) -> Footing {
        footing_on(&self.board, cell)
    }

    /// Place the selected tile on `cell`. Refused unless the node there is
    /// free, the tile would be supported, nothing stands on the cell and
    /// the selected kind is in stock.
    pub fn request_place(&mut self, cell: Cell) -> bool {
        if self.phase != GamePhase::Playing {
            return false;
        }

        let node_free = self.board.node(cell).is_some_and(|node| node.active);
        let placeable = node_free && self.board.can_place(cell) && !self.is_occupied(cell);
        let kind = if placeable {
            self.inventory.take_selected()
        } else {
            None
        };

        let Some(kind) = kind else {
            log::debug!("Placement refused at {}", cell);
            self.events.push(GameEvent::PlacementRefused { cell });
            return false;
        };

        let id = self.next_entity_id();
        let grow_time = self.board.timing().grow_time;
        self.board.place(PlacedTile::new(id, kind, cell, grow_time));
        log::info!("Placed {} tile at {}", kind.as_str(), cell);
        true
    }

    /// Start removing the tile on `cell`; it returns to the inventory and
    /// becomes the selection once it has shrunk away
    pub fn request_remove(&mut self, cell: Cell) -> bool {
        if self.phase != GamePhase::Playing {
            return false;
        }
        let started = self.board.trigger_remove(cell, true);
        if started {
            log::debug!("Removing tile at {}", cell);
        }
        started
    }

    /// Short probe across the cell for objects or the player standing on it
    fn is_occupied(&self, cell: Cell) -> bool {
        let center = cell_center(cell);
        let half = Vec2::new(PLACEMENT_PROBE, 0.0);
        self.colliders
            .linecast(
                center - half,
                center + half,
                LayerMask::OCCUPANT | LayerMask::PLAYER,
                None,
            )
            .is_some()
    }

    /// Turn board notifications into game events and settle the inventory
    pub(crate) fn apply_board_events(&mut self) {
        for event in self.board.drain_events() {
            let event = match event {
                BoardEvent::Placed { id, kind, cell } => GameEvent::TilePlaced { id, kind, cell },
                BoardEvent::Cascaded { id, kind, cell } => {
                    GameEvent::TileCascaded { id, kind, cell }
                }
                BoardEvent::Removed {
                    id,
                    kind,
                    cell,
                    reselect,
                } => {
                    self.inventory.add(kind, reselect);
                    GameEvent::TileRemoved { id, kind, cell }
                }
            };
            self.events.push(event);
        }
    }
}

/// Empty nodes and shrinking tiles give way; everything else holds. A node
/// with no tile that is still inactive has a static object standing on it.
pub(crate) fn footing_on(board: &TileBoard, cell: Cell) -> Footing {
    match board.tile_at(cell) {
        Some(tile) if tile.is_shrinking() => Footing::Void,
        Some(_) => Footing::Solid,
        None if board.node(cell).is_some_and(|node| node.active) => Footing::Void,
        None => Footing::Solid,
    }
}
