//! Simulation tuning
//!
//! Beam range, animation lengths and player speed. Stored as JSON next to the
//! level files; missing or unreadable settings fall back to the defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::sim::TransitionTiming;
use crate::sim::player::PlayerTuning;

/// Pace presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Pace {
    Relaxed,
    #[default]
    Normal,
    Brisk,
}

impl Pace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pace::Relaxed => "Relaxed",
            Pace::Normal => "Normal",
            Pace::Brisk => "Brisk",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "relaxed" | "slow" => Some(Pace::Relaxed),
            "normal" => Some(Pace::Normal),
            "brisk" | "fast" => Some(Pace::Brisk),
            _ => None,
        }
    }

    /// Multiplier applied to every animation length
    pub fn time_scale(&self) -> f32 {
        match self {
            Pace::Relaxed => 1.5,
            Pace::Normal => 1.0,
            Pace::Brisk => 0.5,
        }
    }
}

/// Simulation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pace: Pace,

    // === Beams ===
    /// Beam length in tiles
    pub beam_range: f32,

    // === Tiles ===
    /// Seconds a placed tile takes to grow in
    pub grow_time: f32,
    /// Seconds a removed tile takes to shrink away
    pub shrink_time: f32,

    // === Reactors ===
    /// Seconds between a rock/emitter being hit and it disappearing
    pub explosion_time: f32,

    // === Player ===
    /// Cells per second
    pub player_speed: f32,
    pub fall_time: f32,
    pub burn_time: f32,

    // === Presentation ===
    /// Seconds between flips of the global blink cycle
    pub cycle_delay: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pace: Pace::Normal,

            beam_range: 5.0,

            grow_time: 0.25,
            shrink_time: 0.5,

            explosion_time: 0.5,

            player_speed: 5.0,
            fall_time: 0.98,
            burn_time: 0.4,

            cycle_delay: 0.5,
        }
    }
}

impl Settings {
    /// Create settings from a pace preset (applies preset timings)
    pub fn from_preset(pace: Pace) -> Self {
        let mut settings = Self::default();
        settings.apply_preset(pace);
        settings
    }

    /// Rescale animation lengths and player speed to `pace`, starting from
    /// the current preset's values
    pub fn apply_preset(&mut self, pace: Pace) {
        let scale = pace.time_scale() / self.pace.time_scale();
        self.pace = pace;

        self.grow_time *= scale;
        self.shrink_time *= scale;
        self.explosion_time *= scale;
        self.fall_time *= scale;
        self.burn_time *= scale;
        self.player_speed /= scale;
    }

    pub fn timing(&self) -> TransitionTiming {
        TransitionTiming {
            grow_time: self.grow_time,
            shrink_time: self.shrink_time,
        }
    }

    pub fn player_tuning(&self) -> PlayerTuning {
        PlayerTuning {
            speed: self.player_speed,
            fall_time: self.fall_time,
            burn_time: self.burn_time,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load settings from a JSON file, falling back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if let Ok(json) = std::fs::read_to_string(path) {
            match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(err) => log::warn!("Ignoring settings in {}: {}", path.display(), err),
            }
        }

        log::info!("Using default settings");
        Self::default()
    }

    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        log::info!("Settings saved");
        Ok(())
    }
}
