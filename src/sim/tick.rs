//! Fixed timestep simulation tick
//!
//! One call advances a level by `dt`:
//! 1. Inputs (selection, removal, placement, player move)
//! 2. Tile transitions; finished shrinks are removed and cascade
//! 3. Colliders rebuilt, beams resolved, exits then enters dispatched
//! 4. Late update: explosions, power cues, win tile, player, pickups
//! 5. Global blink cycle

use rand::Rng;

use super::grid::Cell;
use super::state::{GameEvent, GamePhase, GameState, footing_on};
use super::tile::TileKind;
use crate::Direction;
use crate::consts::IDLE_DECISION_TICKS;

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Change the selected inventory slot
    pub select: Option<TileKind>,
    /// Place the selected tile on this node
    pub place: Option<Cell>,
    /// Remove the tile on this cell
    pub remove: Option<Cell>,
    /// Walk one cell
    pub move_dir: Option<Direction>,
    /// Idle/demo mode - seeded AI places, removes and walks
    pub idle_mode: bool,
}

/// Advance the level by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    if state.phase == GamePhase::Cleared {
        return;
    }
    state.time_ticks += 1;

    let mut input = input.clone();
    if input.idle_mode {
        idle_decisions(state, &mut input);
    }

    // Inputs see where everything stood at the end of the last tick
    state.rebuild_colliders();
    if let Some(kind) = input.select {
        state.inventory.select(kind);
    }
    if let Some(cell) = input.remove {
        state.request_remove(cell);
    }
    if let Some(cell) = input.place {
        state.request_place(cell);
    }
    if let Some(dir) = input.move_dir {
        state.player.try_move(dir, &state.colliders);
    }

    // Finished shrinks are removed here, re-validating support
    state.board.advance(dt);
    state.apply_board_events();

    state.rebuild_colliders();
    update_beams(state);

    late_update(state, dt);

    state.cycle.advance(dt);
}

/// Reset, resolve, then tell targets what changed. Every exit is dispatched
/// before any enter.
fn update_beams(state: &mut GameState) {
    let (emitters, reflectors) = state.beam_sources();
    let stats = state.beams.resolve(&emitters, &reflectors, &state.colliders);
    if stats.unresolved > 0 {
        log::debug!(
            "Beams: {} reflectors resolved in {} passes, {} unlit",
            stats.resolved,
            stats.passes,
            stats.unresolved
        );
    }
    let transitions = state.beams.transitions();

    let mut events = Vec::new();
    for id in transitions.exited {
        match state.target_mut(id) {
            Some(target) => {
                events.push(GameEvent::LaserExit { id });
                target.on_laser_exit(&mut events);
            }
            // Removed since last tick
            None => state.beams.forget(id),
        }
    }
    for id in transitions.entered {
        match state.target_mut(id) {
            Some(target) => {
                events.push(GameEvent::LaserEnter { id });
                target.on_laser_enter(&mut events);
            }
            None => {
                log::warn!("Beam lit unknown entity {}", id);
                state.beams.forget(id);
            }
        }
    }

    for event in events {
        state.push_event(event);
    }
}

fn late_update(state: &mut GameState, dt: f32) {
    let mut events = Vec::new();

    // Explosions run out; the objects go and their nodes come back
    for emitter in &mut state.emitters {
        emitter.detonation.update(dt);
    }
    for rock in &mut state.rocks {
        rock.detonation.update(dt);
    }
    let destroyed: Vec<_> = state
        .emitters
        .iter()
        .filter(|e| e.detonation.is_destroyed())
        .map(|e| (e.id, e.cell))
        .chain(
            state
                .rocks
                .iter()
                .filter(|r| r.detonation.is_destroyed())
                .map(|r| (r.id, r.cell)),
        )
        .collect();
    if !destroyed.is_empty() {
        state.emitters.retain(|e| !e.detonation.is_destroyed());
        state.rocks.retain(|r| !r.detonation.is_destroyed());
        for (id, cell) in destroyed {
            log::debug!("{} destroyed, freeing node {}", id, cell);
            state.board.set_node_active(cell, true);
            state.beams.forget(id);
        }
    }

    for power in &mut state.power_tiles {
        power.late_update(&mut events);
    }
    if let Some(win) = &mut state.win_tile {
        win.update(&state.power_tiles);
    }

    let board = &state.board;
    state
        .player
        .update(dt, |cell| footing_on(board, cell), &mut events);

    if !state.player.in_routine() {
        let cell = state.player.cell();
        if let Some(index) = state.pickups.iter().position(|p| p.cell == cell) {
            let pickup = state.pickups.remove(index);
            log::info!("Picked up a {} tile", pickup.kind.as_str());
            state.inventory.add(pickup.kind, true);
            events.push(GameEvent::PickupCollected {
                id: pickup.id,
                kind: pickup.kind,
            });
        }

        let on_active_win = state
            .win_tile
            .as_ref()
            .is_some_and(|win| win.active && win.cell == cell);
        if on_active_win {
            state.player.trigger_win();
        }
    }

    if state.player.has_won() {
        log::info!(
            "Level '{}' cleared after {} ticks",
            state.name,
            state.time_ticks
        );
        state.phase = GamePhase::Cleared;
        events.push(GameEvent::LevelCleared);
    }

    for event in events {
        state.push_event(event);
    }
}

/// Demo AI: every few ticks place, remove or walk at random
fn idle_decisions(state: &mut GameState, input: &mut TickInput) {
    if state.time_ticks % IDLE_DECISION_TICKS as u64 != 0 {
        return;
    }
    let rng = &mut state.rng;

    if rng.random_bool(0.25) {
        let stocked: Vec<TileKind> = state.inventory.available().map(|(kind, _)| kind).collect();
        if !stocked.is_empty() {
            input.select = Some(stocked[rng.random_range(0..stocked.len())]);
        }
    }

    match rng.random_range(0..4) {
        0 | 1 => {
            let cells = state.board.placeable_cells();
            if !cells.is_empty() {
                input.place = Some(cells[rng.random_range(0..cells.len())]);
            }
        }
        2 => {
            let settled: Vec<Cell> = state
                .board
                .tiles()
                .filter(|t| !t.is_transitioning())
                .map(|t| t.cell)
                .collect();
            if !settled.is_empty() {
                input.remove = Some(settled[rng.random_range(0..settled.len())]);
            }
        }
        _ => {
            input.move_dir = Some(Direction::ALL[rng.random_range(0..Direction::ALL.len())]);
        }
    }
}
