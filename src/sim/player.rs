//! Player avatar
//!
//! The player walks the grid one cell at a time. Every non-idle state is a
//! routine advanced by the fixed timestep; input is ignored until the
//! routine ends.
//!
//! - Spawning: walks from the spawn cell to the start cell
//! - Moving: walks to the adjacent destination, then checks footing and beams
//! - Falling / Burned: timed, then respawn
//! - Won: terminal

use glam::Vec2;

use super::EntityId;
use super::grid::Cell;
use super::query::{Aabb, LayerMask, SpatialQuery};
use super::reactor::LaserTarget;
use super::state::GameEvent;
use crate::consts::{ARRIVAL_EPSILON, PLAYER_HALF_EXTENT};
use crate::{Direction, cell_center, world_to_cell};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerState {
    Spawning,
    Idle,
    Moving { destination: Vec2 },
    Falling { remaining: f32 },
    Burned { remaining: f32 },
    Won,
}

impl PlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerState::Spawning => "Spawning",
            PlayerState::Idle => "Idle",
            PlayerState::Moving { .. } => "Moving",
            PlayerState::Falling { .. } => "Falling",
            PlayerState::Burned { .. } => "Burned",
            PlayerState::Won => "Won",
        }
    }
}

/// What the player is standing on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Footing {
    /// Floor, a settled or growing walkable tile, or off the board
    Solid,
    /// An empty node or a tile that is shrinking away
    Void,
}

/// Speeds and routine lengths
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerTuning {
    /// Cells per second
    pub speed: f32,
    pub fall_time: f32,
    pub burn_time: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            speed: 5.0,
            fall_time: 0.98,
            burn_time: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: EntityId,
    pub pos: Vec2,
    pub facing: Direction,
    pub state: PlayerState,
    pub spawn: Cell,
    pub start: Cell,
    /// A beam is touching the player
    pub lit: bool,
    tuning: PlayerTuning,
}

impl Player {
    /// New player, already walking in from the spawn cell
    pub fn new(id: EntityId, spawn: Cell, start: Cell, tuning: PlayerTuning) -> Self {
        Self {
            id,
            pos: cell_center(spawn),
            facing: Direction::Right,
            state: PlayerState::Spawning,
            spawn,
            start,
            lit: false,
            tuning,
        }
    }

    /// Cell under the player's centre
    pub fn cell(&self) -> Cell {
        world_to_cell(self.pos)
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::centered(self.pos, PLAYER_HALF_EXTENT)
    }

    pub fn layers(&self) -> LayerMask {
        LayerMask::LASER_TARGET | LayerMask::PLAYER
    }

    /// True while any routine runs (everything but Idle)
    pub fn in_routine(&self) -> bool {
        !matches!(self.state, PlayerState::Idle)
    }

    pub fn has_won(&self) -> bool {
        matches!(self.state, PlayerState::Won)
    }

    /// Face `dir` and start walking one cell that way unless a movement
    /// blocker is in the way. Refused during routines.
    pub fn try_move<Q: SpatialQuery>(&mut self, dir: Direction, query: &Q) -> bool {
        if self.in_routine() {
            return false;
        }
        self.facing = dir;

        let destination = self.pos + dir.vector();
        if let Some(hit) = query.linecast(self.pos, destination, LayerMask::SOLID, Some(self.id)) {
            log::debug!("Player move {:?} blocked by {}", dir, hit.entity);
            return false;
        }

        self.state = PlayerState::Moving { destination };
        true
    }

    /// Start walking in from the spawn cell again
    pub fn respawn(&mut self, events: &mut Vec<GameEvent>) {
        self.pos = cell_center(self.spawn);
        self.facing = Direction::Right;
        self.state = PlayerState::Spawning;
        events.push(GameEvent::PlayerRespawned { id: self.id });
    }

    pub fn trigger_fall(&mut self, events: &mut Vec<GameEvent>) {
        log::info!("Player fell at {}", self.cell());
        self.state = PlayerState::Falling {
            remaining: self.tuning.fall_time,
        };
        events.push(GameEvent::PlayerFell {
            id: self.id,
            cell: self.cell(),
        });
    }

    pub fn trigger_burn(&mut self, events: &mut Vec<GameEvent>) {
        log::info!("Player burned at {}", self.cell());
        self.state = PlayerState::Burned {
            remaining: self.tuning.burn_time,
        };
        events.push(GameEvent::PlayerBurned {
            id: self.id,
            cell: self.cell(),
        });
    }

    /// Enter the terminal win state. Only from Idle.
    pub fn trigger_win(&mut self) -> bool {
        if self.in_routine() {
            return false;
        }
        self.state = PlayerState::Won;
        true
    }

    /// Advance the current routine, or run the idle checks (burn, then
    /// footing). `footing` reports what lies under a cell.
    pub fn update(
        &mut self,
        dt: f32,
        footing: impl Fn(Cell) -> Footing,
        events: &mut Vec<GameEvent>,
    ) {
        match self.state {
            PlayerState::Won => {}
            PlayerState::Spawning => {
                let start = cell_center(self.start);
                if self.walk_toward(start, dt) {
                    self.state = PlayerState::Idle;
                }
            }
            PlayerState::Moving { destination } => {
                if self.walk_toward(destination, dt) {
                    self.state = PlayerState::Idle;
                    if footing(self.cell()) == Footing::Void {
                        self.trigger_fall(events);
                    } else if self.lit {
                        self.trigger_burn(events);
                    }
                }
            }
            PlayerState::Falling { ref mut remaining }
            | PlayerState::Burned { ref mut remaining } => {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    self.respawn(events);
                }
            }
            PlayerState::Idle => {
                // Something changed under an idle player: a blocker was
                // removed, a beam redirected, a tile cascaded away
                if self.lit {
                    self.trigger_burn(events);
                } else if footing(self.cell()) == Footing::Void {
                    self.trigger_fall(events);
                }
            }
        }
    }

    /// Step toward `target` at the configured speed. Returns true on
    /// arrival (position snapped).
    fn walk_toward(&mut self, target: Vec2, dt: f32) -> bool {
        let step = self.tuning.speed * dt;
        let delta = target - self.pos;
        let distance = delta.length();

        if distance <= step || distance < ARRIVAL_EPSILON {
            self.pos = target;
            return true;
        }
        self.pos += delta / distance * step;
        false
    }
}

impl LaserTarget for Player {
    fn on_laser_enter(&mut self, _events: &mut Vec<GameEvent>) {
        self.lit = true;
    }

    fn on_laser_exit(&mut self, _events: &mut Vec<GameEvent>) {
        self.lit = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::query::ColliderSet;
    use glam::IVec2;

    const DT: f32 = 1.0 / 60.0;

    fn idle_player_at(cell: Cell) -> Player {
        let mut player = Player::new(EntityId(1), cell, cell, PlayerTuning::default());
        player.update(DT, |_| Footing::Solid, &mut Vec::new());
        assert_eq!(player.state, PlayerState::Idle);
        player
    }

    fn run(
        player: &mut Player,
        ticks: u32,
        footing: impl Fn(Cell) -> Footing + Copy,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..ticks {
            player.update(DT, footing, &mut events);
        }
        events
    }

    #[test]
    fn test_spawn_walks_to_start() {
        let mut player = Player::new(
            EntityId(1),
            IVec2::new(-1, 0),
            IVec2::new(0, 0),
            PlayerTuning::default(),
        );
        assert!(player.in_routine());
        // 1 cell at 5 cells/s is about 12 ticks
        run(&mut player, 15, |_| Footing::Solid);
        assert_eq!(player.state, PlayerState::Idle);
        assert_eq!(player.cell(), IVec2::new(0, 0));
    }

    #[test]
    fn test_move_blocked_by_solid() {
        let mut player = idle_player_at(IVec2::new(1, 1));
        let mut colliders = ColliderSet::new();
        colliders.push(EntityId(1), player.bounds(), player.layers());
        colliders.push(EntityId(2), Aabb::from_cell(IVec2::new(2, 1)), LayerMask::SOLID);

        assert!(!player.try_move(Direction::Right, &colliders));
        assert_eq!(player.facing, Direction::Right);
        assert!(player.try_move(Direction::Up, &colliders));
        assert!(!player.try_move(Direction::Up, &colliders));
    }

    #[test]
    fn test_move_onto_void_falls_then_respawns() {
        let mut player = idle_player_at(IVec2::new(1, 1));
        assert!(player.try_move(Direction::Up, &ColliderSet::new()));

        let void_above = |cell: Cell| {
            if cell == IVec2::new(1, 2) {
                Footing::Void
            } else {
                Footing::Solid
            }
        };
        let events = run(&mut player, 15, void_above);
        assert!(matches!(player.state, PlayerState::Falling { .. }));
        assert!(matches!(events[0], GameEvent::PlayerFell { .. }));

        let events = run(&mut player, 60, void_above);
        assert!(events.contains(&GameEvent::PlayerRespawned { id: EntityId(1) }));
    }

    #[test]
    fn test_lit_idle_player_burns() {
        let mut player = idle_player_at(IVec2::new(1, 1));
        player.on_laser_enter(&mut Vec::new());
        let events = run(&mut player, 1, |_| Footing::Solid);
        assert!(matches!(player.state, PlayerState::Burned { .. }));
        assert_eq!(events.len(), 1);

        // No second burn while the routine runs
        let events = run(&mut player, 10, |_| Footing::Solid);
        assert!(events.is_empty());
    }

    #[test]
    fn test_footing_lost_while_idle() {
        let mut player = idle_player_at(IVec2::new(0, 0));
        let events = run(&mut player, 1, |_| Footing::Void);
        assert!(matches!(events[0], GameEvent::PlayerFell { .. }));
    }

    #[test]
    fn test_win_only_from_idle() {
        let mut player = Player::new(EntityId(1), IVec2::ZERO, IVec2::X, PlayerTuning::default());
        assert!(!player.trigger_win());
        run(&mut player, 20, |_| Footing::Solid);
        assert!(player.trigger_win());
        assert!(player.has_won());
        assert!(!player.try_move(Direction::Up, &ColliderSet::new()));
    }
}
