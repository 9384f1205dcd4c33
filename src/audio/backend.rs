//! Sound-rendering collaborator interface
//!
//! The engine never does DSP itself. Everything audible goes through a
//! [`SynthBackend`], which owns the actual audio output session.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Result type for backend calls. Messages are transported as plain strings,
/// the engine maps them into its own error taxonomy.
pub type BackendResult<T> = std::result::Result<T, String>;

/// External synthesis collaborator
#[async_trait]
pub trait SynthBackend: Send + Sync {
    /// Open the shared audio output session (device, context, graph...).
    async fn start(&self) -> BackendResult<()>;

    /// Resume the session if the platform suspended it.
    async fn resume_if_suspended(&self) -> BackendResult<()>;

    fn render_note(
        &self,
        frequency_hz: f64,
        duration_secs: f64,
        instrument: &str,
        velocity: f32,
    ) -> BackendResult<()>;

    fn render_drum(&self, drum_id: &str, volume: f32) -> BackendResult<()>;

    fn set_master_volume(&self, level: f32);
}

/// Backend that only logs what it would play
#[derive(Debug, Default)]
pub struct LogBackend;

#[async_trait]
impl SynthBackend for LogBackend {
    async fn start(&self) -> BackendResult<()> {
        log::info!("LogBackend: audio session opened");
        Ok(())
    }

    async fn resume_if_suspended(&self) -> BackendResult<()> {
        Ok(())
    }

    fn render_note(
        &self,
        frequency_hz: f64,
        duration_secs: f64,
        instrument: &str,
        velocity: f32,
    ) -> BackendResult<()> {
        log::info!(
            "note: {:.2} Hz, {:.3}s, instrument={}, velocity={:.2}",
            frequency_hz,
            duration_secs,
            instrument,
            velocity
        );
        Ok(())
    }

    fn render_drum(&self, drum_id: &str, volume: f32) -> BackendResult<()> {
        log::info!("drum: {}, volume={:.2}", drum_id, volume);
        Ok(())
    }

    fn set_master_volume(&self, level: f32) {
        log::info!("master volume: {:.2}", level);
    }
}

/// One call received by a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    Note {
        frequency_hz: f64,
        duration_secs: f64,
        instrument: String,
        velocity: f32,
        at: tokio::time::Instant,
    },
    Drum {
        drum_id: String,
        volume: f32,
        at: tokio::time::Instant,
    },
}

/// Backend that records every call, with configurable failures.
///
/// Timestamps come from `tokio::time::Instant` so they follow a paused test clock.
#[derive(Default)]
pub struct RecordingBackend {
    calls: Mutex<Vec<RenderCall>>,
    start_count: AtomicUsize,
    resume_count: AtomicUsize,
    master_volume: Mutex<Option<f32>>,
    /// Number of upcoming `start()` calls that fail
    failing_starts: AtomicUsize,
    /// Simulated setup latency
    start_delay: Mutex<Option<std::time::Duration>>,
    /// Render calls for these instruments/drums fail
    failing_sounds: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_next_starts(&self, count: usize) {
        self.failing_starts.store(count, Ordering::SeqCst);
    }

    pub fn set_start_delay(&self, delay: std::time::Duration) {
        *self.start_delay.lock() = Some(delay);
    }

    pub fn fail_sound(&self, id: &str) {
        self.failing_sounds.lock().push(id.to_string());
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    pub fn drum_calls(&self, drum_id: &str) -> Vec<tokio::time::Instant> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                RenderCall::Drum { drum_id: id, at, .. } if id == drum_id => Some(*at),
                _ => None,
            })
            .collect()
    }

    pub fn note_calls(&self) -> Vec<RenderCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RenderCall::Note { .. }))
            .cloned()
            .collect()
    }

    pub fn start_count(&self) -> usize {
        self.start_count.load(Ordering::SeqCst)
    }

    pub fn resume_count(&self) -> usize {
        self.resume_count.load(Ordering::SeqCst)
    }

    pub fn master_volume(&self) -> Option<f32> {
        *self.master_volume.lock()
    }

    fn should_fail(&self, id: &str) -> bool {
        self.failing_sounds.lock().iter().any(|s| s == id)
    }
}

#[async_trait]
impl SynthBackend for RecordingBackend {
    async fn start(&self) -> BackendResult<()> {
        self.start_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.start_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self.failing_starts.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_starts.store(failing - 1, Ordering::SeqCst);
            return Err("no output device".to_string());
        }
        Ok(())
    }

    async fn resume_if_suspended(&self) -> BackendResult<()> {
        self.resume_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn render_note(
        &self,
        frequency_hz: f64,
        duration_secs: f64,
        instrument: &str,
        velocity: f32,
    ) -> BackendResult<()> {
        if self.should_fail(instrument) {
            return Err(format!("instrument {} failed to render", instrument));
        }
        self.calls.lock().push(RenderCall::Note {
            frequency_hz,
            duration_secs,
            instrument: instrument.to_string(),
            velocity,
            at: tokio::time::Instant::now(),
        });
        Ok(())
    }

    fn render_drum(&self, drum_id: &str, volume: f32) -> BackendResult<()> {
        if self.should_fail(drum_id) {
            return Err(format!("drum {} failed to render", drum_id));
        }
        self.calls.lock().push(RenderCall::Drum {
            drum_id: drum_id.to_string(),
            volume,
            at: tokio::time::Instant::now(),
        });
        Ok(())
    }

    fn set_master_volume(&self, level: f32) {
        *self.master_volume.lock() = Some(level);
    }
}
