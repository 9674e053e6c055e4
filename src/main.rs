//! Laser Tiles entry point
//!
//! Headless runner: loads a level (or the built-in demo), lets the idle AI
//! play it at the fixed timestep and logs what happens.

#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;
#[cfg(not(target_arch = "wasm32"))]
use std::process::ExitCode;

#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;
#[cfg(not(target_arch = "wasm32"))]
use laser_tiles::consts::SIM_DT;
#[cfg(not(target_arch = "wasm32"))]
use laser_tiles::sim::{GameEvent, GamePhase, GameState, TickInput, tick};
#[cfg(not(target_arch = "wasm32"))]
use laser_tiles::{LevelError, LevelSpec, Pace, Settings};

#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Level JSON file. Plays the built-in demo when omitted.
    level: Option<PathBuf>,

    /// Settings JSON file
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Fixed steps to simulate before giving up
    #[arg(long, default_value_t = 60 * 60)]
    ticks: u64,

    /// Seed for the idle player
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Pace preset: relaxed, normal or brisk
    #[arg(long, value_parser = parse_pace)]
    pace: Option<Pace>,

    /// Write the effective settings to this file and keep going
    #[arg(long)]
    save_settings: Option<PathBuf>,
}

#[cfg(not(target_arch = "wasm32"))]
fn parse_pace(s: &str) -> Result<Pace, String> {
    Pace::from_str(s).ok_or_else(|| format!("unknown pace '{}'", s))
}

#[cfg(not(target_arch = "wasm32"))]
fn load_level(args: &Args) -> Result<LevelSpec, LevelError> {
    match &args.level {
        Some(path) => LevelSpec::load(path),
        None => {
            log::info!("No level given, playing the built-in demo");
            LevelSpec::demo()
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn log_event(event: &GameEvent) {
    match event {
        GameEvent::LaserEnter { .. } | GameEvent::LaserExit { .. } => {
            log::debug!("{:?}", event)
        }
        GameEvent::PlacementRefused { cell } => log::debug!("Placement refused at {}", cell),
        GameEvent::LevelCleared => log::info!("Level cleared!"),
        other => log::info!("{:?}", other),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> ExitCode {
    env_logger::init();
    log::info!("Laser Tiles (headless) starting...");

    let args = Args::parse();

    let level = match load_level(&args) {
        Ok(level) => level,
        Err(err) => {
            log::error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    let mut settings = match &args.settings {
        Some(path) => Settings::load(path),
        None => Settings::default(),
    };
    if let Some(pace) = args.pace {
        settings.apply_preset(pace);
    }
    if let Some(path) = &args.save_settings {
        if let Err(err) = settings.save(path) {
            log::warn!("Could not save settings to {}: {}", path.display(), err);
        }
    }

    let mut state = GameState::new(&level, settings, args.seed);
    let input = TickInput {
        idle_mode: true,
        ..Default::default()
    };

    let mut placed = 0u32;
    let mut cascaded = 0u32;
    for _ in 0..args.ticks {
        tick(&mut state, &input, SIM_DT);
        for event in state.drain_events() {
            match event {
                GameEvent::TilePlaced { .. } => placed += 1,
                GameEvent::TileCascaded { .. } => cascaded += 1,
                _ => {}
            }
            log_event(&event);
        }
        if state.phase == GamePhase::Cleared {
            break;
        }
    }

    println!(
        "'{}': {} ticks, {} placed, {} cascaded, {} on board, {} beams, {} lit, {} in stock, {}",
        state.name,
        state.time_ticks,
        placed,
        cascaded,
        state.board.tile_count(),
        state.beams.segments().len(),
        state.beams.lit().len(),
        state.inventory.total(),
        match state.phase {
            GamePhase::Playing => "still playing",
            GamePhase::Cleared => "cleared",
        }
    );
    ExitCode::SUCCESS
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // Headless runner is native only
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["laser-tiles"]).unwrap();
        assert!(args.level.is_none());
        assert_eq!(args.ticks, 3600);
        assert_eq!(args.seed, 1);
        assert!(args.pace.is_none());
    }

    #[test]
    fn test_args_level_and_pace() {
        let args = Args::try_parse_from([
            "laser-tiles",
            "levels/demo.json",
            "--pace",
            "FAST",
            "--seed",
            "7",
        ])
        .unwrap();
        assert_eq!(args.level, Some(PathBuf::from("levels/demo.json")));
        assert_eq!(args.pace, Some(Pace::Brisk));
        assert_eq!(args.seed, 7);
    }

    #[test]
    fn test_args_reject_unknown_pace() {
        assert!(Args::try_parse_from(["laser-tiles", "--pace", "ludicrous"]).is_err());
    }
}
