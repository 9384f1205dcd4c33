//! Looping 16-step drum pattern playback
//!
//! One run at a time: starting a pattern aborts whatever was running and
//! starts again from step 0. Ticks come from a tokio interval, so timing is
//! only as good as the timer (no sample accuracy).

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::audio::NoteTrigger;
use crate::error::{check_bpm, Error, Result};

/// Steps per pattern (16th notes in one bar of 4/4)
pub const STEPS: usize = 16;

/// Track name -> 16 on/off steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pattern {
    tracks: BTreeMap<String, [bool; STEPS]>,
}

impl Pattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a track. Fails unless `steps` has exactly 16 entries.
    pub fn with_track(mut self, name: impl Into<String>, steps: &[bool]) -> Result<Self> {
        self.set_track(name, steps)?;
        Ok(self)
    }

    pub fn set_track(&mut self, name: impl Into<String>, steps: &[bool]) -> Result<()> {
        let name = name.into();
        let steps: [bool; STEPS] = steps.try_into().map_err(|_| {
            Error::InvalidPattern(format!(
                "track '{}' has {} steps, expected {}",
                name,
                steps.len(),
                STEPS
            ))
        })?;
        self.tracks.insert(name, steps);
        Ok(())
    }

    /// Toggle-style edit; `step` wraps modulo 16
    pub fn set_step(&mut self, track: &str, step: usize, on: bool) {
        let steps = self
            .tracks
            .entry(track.to_string())
            .or_insert([false; STEPS]);
        steps[step % STEPS] = on;
    }

    pub fn track(&self, name: &str) -> Option<&[bool; STEPS]> {
        self.tracks.get(name)
    }

    pub fn track_names(&self) -> impl Iterator<Item = &str> {
        self.tracks.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks that sound on a step (any counter value, taken modulo 16)
    pub fn hits_at(&self, step: u64) -> Vec<&str> {
        let index = (step % STEPS as u64) as usize;
        self.tracks
            .iter()
            .filter(|(_, steps)| steps[index])
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl TryFrom<BTreeMap<String, Vec<bool>>> for Pattern {
    type Error = Error;

    fn try_from(tracks: BTreeMap<String, Vec<bool>>) -> Result<Self> {
        let mut pattern = Pattern::new();
        for (name, steps) in tracks {
            pattern.set_track(name, &steps)?;
        }
        Ok(pattern)
    }
}

/// Length of one step (a 16th note) at `bpm`
pub fn step_duration(bpm: f64) -> Result<Duration> {
    check_bpm(bpm)?;
    Ok(Duration::from_secs_f64(60.0 / bpm / 4.0))
}

struct ActiveRun {
    task: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
    bpm: f64,
}

pub struct StepSequencer {
    trigger: NoteTrigger,
    drum_volume: f32,
    run: Mutex<Option<ActiveRun>>,
}

impl StepSequencer {
    pub fn new(trigger: NoteTrigger, drum_volume: f32) -> Self {
        Self {
            trigger,
            drum_volume,
            run: Mutex::new(None),
        }
    }

    /// Start looping `pattern` at `bpm`, replacing any current run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn play_pattern(&self, pattern: Pattern, bpm: f64) -> Result<()> {
        let period = step_duration(bpm)?;

        let mut run = self.run.lock();
        if let Some(previous) = run.take() {
            previous.task.abort();
            log::debug!("StepSequencer: cancelled previous run");
        }

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ticks = Arc::new(AtomicU64::new(0));
        let run_ticks = Arc::clone(&ticks);
        let trigger = self.trigger.clone();
        let volume = self.drum_volume;

        log::info!(
            "StepSequencer: playing {} tracks at {} bpm ({:.1} ms/step)",
            pattern.len(),
            bpm,
            period.as_secs_f64() * 1000.0
        );

        let task = tokio::spawn(async move {
            loop {
                interval.tick().await;
                let tick = run_ticks.fetch_add(1, Ordering::SeqCst);
                let hits = pattern.hits_at(tick);
                log::trace!("StepSequencer: step {} -> {:?}", tick % STEPS as u64, hits);
                for track in hits {
                    trigger.play_drum_sound(track, volume).await;
                }
            }
        });

        *run = Some(ActiveRun { task, ticks, bpm });
        Ok(())
    }

    /// Stop playback and reset to step 0
    pub fn stop_pattern(&self) {
        if let Some(previous) = self.run.lock().take() {
            previous.task.abort();
            log::info!("StepSequencer: stopped");
        }
    }

    /// True while a run is armed
    pub fn is_playing(&self) -> bool {
        self.run.lock().is_some()
    }

    /// Ticks fired by the current run (0 when idle)
    pub fn tick_count(&self) -> u64 {
        self.run
            .lock()
            .as_ref()
            .map(|r| r.ticks.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Step the next tick will play, always in 0..16
    pub fn current_step(&self) -> usize {
        (self.tick_count() % STEPS as u64) as usize
    }

    pub fn bpm(&self) -> Option<f64> {
        self.run.lock().as_ref().map(|r| r.bpm)
    }
}

impl Drop for StepSequencer {
    fn drop(&mut self) {
        self.stop_pattern();
    }
}
