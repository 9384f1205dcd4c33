//! Headless console driver
//!
//! Plays a drum pattern and/or a MIDI file through the logging backend and
//! optionally plays live notes from connected MIDI hardware.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use studio_engine::logging::init_logging;
use studio_engine::{EngineConfig, LogBackend, LogNotifier, Pattern, Result, Studio};

#[derive(Parser)]
#[command(name = "studio-engine")]
#[command(about = "Play drum patterns, melodies and live MIDI input")]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tempo for the drum pattern
    #[arg(short, long, default_value = "120")]
    bpm: f64,

    /// Pattern JSON file ({"kick": [true, false, ...16 steps], ...}); a basic beat if omitted
    #[arg(short, long)]
    pattern: Option<PathBuf>,

    /// Don't play a drum pattern
    #[arg(long)]
    no_pattern: bool,

    /// Standard MIDI File to play as a melody
    #[arg(short, long)]
    midi_file: Option<PathBuf>,

    /// Listen to MIDI input devices
    #[arg(short, long)]
    listen: bool,

    /// List MIDI devices and exit
    #[arg(long)]
    list_devices: bool,

    /// How long to run, in seconds
    #[arg(short, long, default_value = "8")]
    seconds: u64,
}

fn basic_beat() -> Result<Pattern> {
    let on = |steps: &[usize]| {
        let mut track = [false; 16];
        for &s in steps {
            track[s] = true;
        }
        track
    };
    Pattern::new()
        .with_track("kick", &on(&[0, 4, 8, 12]))?
        .with_track("snare", &on(&[4, 12]))?
        .with_track("hihat", &on(&[0, 2, 4, 6, 8, 10, 12, 14]))
}

fn load_pattern(path: &Path) -> Result<Pattern> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

async fn run(args: Args, config: EngineConfig) -> Result<()> {
    let studio = Studio::with_midir(Arc::new(LogBackend), Arc::new(LogNotifier), config)?;
    studio.subscribe(|| log::info!("Audio session ready"));

    if args.list_devices {
        studio.initialize_midi().await?;
        for device in studio.devices() {
            println!(
                "{:<40} {:<30} {:?} {:?}",
                device.id, device.name, device.connection_kind, device.state
            );
        }
        return Ok(());
    }

    studio.initialize().await?;

    if args.listen {
        // No MIDI is not fatal for the rest of the session
        if let Err(e) = studio.initialize_midi().await {
            log::warn!("MIDI input unavailable: {}", e);
        }
    }

    if !args.no_pattern {
        let pattern = match &args.pattern {
            Some(path) => load_pattern(path)?,
            None => basic_beat()?,
        };
        studio.play_pattern(pattern, args.bpm)?;
    }

    if let Some(path) = &args.midi_file {
        let melody = studio.load_melody_file(path)?;
        log::info!(
            "Playing {} notes from {} ({})",
            melody.notes.len(),
            path.display(),
            melody.track_names.join(", ")
        );
        studio.play_melody(&melody.notes, melody.bpm)?;
    }

    tokio::time::sleep(Duration::from_secs(args.seconds)).await;
    studio.stop_all();

    if let Some(last) = studio.last_note() {
        log::info!("Last MIDI note: {} on {}", last.name, last.instrument);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::load_or_default(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config.logging);

    if let Err(e) = run(args, config).await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
