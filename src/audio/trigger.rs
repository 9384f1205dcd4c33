//! Symbolic note/drum requests to synthesis calls
//!
//! Trigger calls are fire and forget: any failure is logged here and never
//! reaches the caller, so a bad render cannot stop a running sequencer.

use std::sync::Arc;

use super::pitch::pitch_to_frequency;
use super::session::SessionState;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct NoteTrigger {
    session: Arc<SessionState>,
}

impl NoteTrigger {
    pub fn new(session: Arc<SessionState>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    /// Play a pitched note. Errors are logged and swallowed.
    pub async fn play_note(
        &self,
        pitch: &str,
        octave: i32,
        duration_secs: f64,
        instrument: &str,
        velocity: f32,
    ) {
        if let Err(e) = self
            .try_play_note(pitch, octave, duration_secs, instrument, velocity)
            .await
        {
            log::warn!("play_note {}{} on {} dropped: {}", pitch, octave, instrument, e);
        }
    }

    /// Play a drum hit. Errors are logged and swallowed.
    pub async fn play_drum_sound(&self, drum_id: &str, volume: f32) {
        if let Err(e) = self.try_play_drum_sound(drum_id, volume).await {
            log::warn!("play_drum_sound {} dropped: {}", drum_id, e);
        }
    }

    pub async fn try_play_note(
        &self,
        pitch: &str,
        octave: i32,
        duration_secs: f64,
        instrument: &str,
        velocity: f32,
    ) -> Result<()> {
        self.prepare().await?;

        let frequency = pitch_to_frequency(pitch, octave)?;
        let duration = if duration_secs.is_finite() { duration_secs.max(0.0) } else { 0.0 };
        let velocity = clamp_unit(velocity);

        log::debug!(
            "Trigger note {}{} ({:.2} Hz) {:.3}s on {} @ {:.2}",
            pitch,
            octave,
            frequency,
            duration,
            instrument,
            velocity
        );

        self.session
            .backend()
            .render_note(frequency, duration, instrument, velocity)
            .map_err(Error::RenderFailure)
    }

    pub async fn try_play_drum_sound(&self, drum_id: &str, volume: f32) -> Result<()> {
        self.prepare().await?;
        log::debug!("Trigger drum {} @ {:.2}", drum_id, volume);
        self.session
            .backend()
            .render_drum(drum_id, clamp_unit(volume))
            .map_err(Error::RenderFailure)
    }

    pub fn set_master_volume(&self, level: f32) {
        self.session.set_master_volume(level);
    }

    /// Bring the session up if needed, then resume it. Runs on every call.
    async fn prepare(&self) -> Result<()> {
        if !self.session.is_initialized() {
            self.session.initialize().await?;
        }
        self.session.resume().await
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
