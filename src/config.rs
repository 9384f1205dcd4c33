//! Engine configuration
//!
//! Read from `<config_dir>/studio-engine/config.json`. Every field is optional
//! in the file and falls back to its default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::midi::{ChannelInstrumentMap, MidiSettings};

pub const APP_DIR: &str = "studio-engine";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Log file override; `None` uses the data directory
    pub file: Option<PathBuf>,
    pub log_to_file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            log_to_file: false,
        }
    }
}

impl LoggingConfig {
    /// Where log lines are appended when `log_to_file` is set
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file.clone().or_else(|| {
            dirs::data_dir().map(|dir| dir.join(APP_DIR).join("logs").join("studio-engine.log"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub master_volume: f32,
    pub default_instrument: String,
    pub default_velocity: f32,
    /// Volume of every step sequencer hit
    pub drum_volume: f32,
    /// Fixed sustain of MIDI note-ons, seconds
    pub midi_note_duration: f64,
    pub hotplug_poll_ms: u64,
    pub channels: ChannelInstrumentMap,
    pub midi: MidiSettings,
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            master_volume: 0.8,
            default_instrument: "piano".to_string(),
            default_velocity: 0.8,
            drum_volume: 0.8,
            midi_note_duration: 1.0,
            hotplug_poll_ms: 1000,
            channels: ChannelInstrumentMap::default(),
            midi: MidiSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: EngineConfig = serde_json::from_str(&contents)?;
        config.midi.normalize();
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the default config file, or defaults when it does not exist
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                log::debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("masterVolume", self.master_volume),
            ("defaultVelocity", self.default_velocity),
            ("drumVolume", self.drum_volume),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within 0..1, got {}", name, value)));
            }
        }
        if !(self.midi_note_duration.is_finite() && self.midi_note_duration > 0.0) {
            return Err(Error::Config(format!(
                "midiNoteDuration must be positive, got {}",
                self.midi_note_duration
            )));
        }
        if self.hotplug_poll_ms == 0 {
            return Err(Error::Config("hotplugPollMs must be positive".to_string()));
        }
        if self.default_instrument.is_empty() {
            return Err(Error::Config("defaultInstrument is empty".to_string()));
        }
        Ok(())
    }
}
