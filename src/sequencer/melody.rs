//! One-shot melody scheduling
//!
//! Each note gets its own timer task. A new melody, `stop_melody()` or
//! dropping the scheduler aborts every timer that has not fired yet.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::audio::NoteTrigger;
use crate::error::{check_bpm, Error, Result};

/// An absolutely-timed note in a melody.
///
/// Validated on construction: start >= 0, duration > 0, velocity in 0..=1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNoteEvent", rename_all = "camelCase")]
pub struct NoteEvent {
    pitch: String,
    octave: i32,
    start_offset_beats: f64,
    duration_beats: f64,
    instrument: String,
    velocity: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNoteEvent {
    pitch: String,
    octave: i32,
    start_offset_beats: f64,
    duration_beats: f64,
    #[serde(default = "default_instrument")]
    instrument: String,
    #[serde(default = "default_velocity")]
    velocity: f32,
}

fn default_instrument() -> String {
    "piano".to_string()
}

fn default_velocity() -> f32 {
    0.8
}

impl TryFrom<RawNoteEvent> for NoteEvent {
    type Error = Error;

    fn try_from(raw: RawNoteEvent) -> Result<Self> {
        NoteEvent::new(
            raw.pitch,
            raw.octave,
            raw.start_offset_beats,
            raw.duration_beats,
            raw.instrument,
            raw.velocity,
        )
    }
}

impl NoteEvent {
    /// Fails with `InvalidPitch` or `InvalidPattern` when a field is out of range
    pub fn new(
        pitch: impl Into<String>,
        octave: i32,
        start_offset_beats: f64,
        duration_beats: f64,
        instrument: impl Into<String>,
        velocity: f32,
    ) -> Result<Self> {
        let pitch = pitch.into();
        crate::audio::pitch::note_index(&pitch, octave)?;
        if !(start_offset_beats.is_finite() && start_offset_beats >= 0.0) {
            return Err(Error::InvalidPattern(format!(
                "note {}{} starts at {} beats",
                pitch, octave, start_offset_beats
            )));
        }
        if !(duration_beats.is_finite() && duration_beats > 0.0) {
            return Err(Error::InvalidPattern(format!(
                "note {}{} lasts {} beats",
                pitch, octave, duration_beats
            )));
        }
        if !(0.0..=1.0).contains(&velocity) {
            return Err(Error::InvalidPattern(format!(
                "note {}{} has velocity {}",
                pitch, octave, velocity
            )));
        }
        Ok(Self {
            pitch,
            octave,
            start_offset_beats,
            duration_beats,
            instrument: instrument.into(),
            velocity,
        })
    }

    /// Note name without octave, e.g. "F#"
    pub fn pitch(&self) -> &str {
        &self.pitch
    }

    pub fn octave(&self) -> i32 {
        self.octave
    }

    /// Beats from the start of the melody
    pub fn start_offset_beats(&self) -> f64 {
        self.start_offset_beats
    }

    /// Sustain in beats, converted to seconds at the melody's tempo
    pub fn duration_beats(&self) -> f64 {
        self.duration_beats
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// 0..=1
    pub fn velocity(&self) -> f32 {
        self.velocity
    }
}

/// Plays one melody at a time against the shared trigger
pub struct MelodyScheduler {
    trigger: NoteTrigger,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl MelodyScheduler {
    pub fn new(trigger: NoteTrigger) -> Self {
        Self {
            trigger,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Schedule every note of `notes` relative to now, replacing any previous melody.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn play_melody(&self, notes: &[NoteEvent], bpm: f64) -> Result<()> {
        check_bpm(bpm)?;

        let beat = 60.0 / bpm;
        let start = Instant::now();
        // Resolve every fire time before touching the current melody
        let fire_times = notes
            .iter()
            .map(|note| fire_time(start, note, beat))
            .collect::<Result<Vec<_>>>()?;

        let mut pending = self.pending.lock();
        abort_all(&mut pending);
        log::info!("MelodyScheduler: scheduling {} notes at {} bpm", notes.len(), bpm);

        for (note, fire_at) in notes.iter().zip(fire_times) {
            let duration = note.duration_beats * beat;
            let note = note.clone();
            let trigger = self.trigger.clone();
            pending.push(tokio::spawn(async move {
                tokio::time::sleep_until(fire_at).await;
                trigger
                    .play_note(
                        &note.pitch,
                        note.octave,
                        duration,
                        &note.instrument,
                        note.velocity,
                    )
                    .await;
            }));
        }
        Ok(())
    }

    /// Cancel every note that has not fired yet
    pub fn stop_melody(&self) {
        let mut pending = self.pending.lock();
        if !pending.is_empty() {
            log::info!("MelodyScheduler: stopped");
        }
        abort_all(&mut pending);
    }

    /// Notes scheduled but not yet played
    pub fn pending_count(&self) -> usize {
        self.pending.lock().iter().filter(|h| !h.is_finished()).count()
    }

    /// True while any note is still waiting to fire
    pub fn is_playing(&self) -> bool {
        self.pending_count() > 0
    }
}

/// Absolute fire time of `note`, or an error when it lies beyond what the clock can represent
fn fire_time(start: Instant, note: &NoteEvent, beat: f64) -> Result<Instant> {
    Duration::try_from_secs_f64(note.start_offset_beats * beat)
        .ok()
        .and_then(|offset| start.checked_add(offset))
        .ok_or_else(|| {
            Error::InvalidPattern(format!(
                "note {}{} at beat {} cannot be scheduled",
                note.pitch, note.octave, note.start_offset_beats
            ))
        })
}

fn abort_all(pending: &mut Vec<JoinHandle<()>>) {
    for handle in pending.drain(..) {
        handle.abort();
    }
}

impl Drop for MelodyScheduler {
    fn drop(&mut self) {
        abort_all(&mut self.pending.lock());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{RecordingBackend, RenderCall, SessionState};
    use crate::notify::LogNotifier;
    use std::sync::Arc;

    fn scheduler(backend: &Arc<RecordingBackend>) -> MelodyScheduler {
        let session = SessionState::new(backend.clone(), Arc::new(LogNotifier));
        MelodyScheduler::new(NoteTrigger::new(session))
    }

    fn note(pitch: &str, start: f64, duration: f64) -> NoteEvent {
        NoteEvent::new(pitch, 4, start, duration, "piano", 0.8).unwrap()
    }

    #[test]
    fn test_note_event_validation() {
        assert!(NoteEvent::new("C", 4, 0.0, 1.0, "piano", 0.5).is_ok());
        assert!(NoteEvent::new("C", 4, -1.0, 1.0, "piano", 0.5).is_err());
        assert!(NoteEvent::new("C", 4, 0.0, 0.0, "piano", 0.5).is_err());
        assert!(NoteEvent::new("C", 4, 0.0, 1.0, "piano", 1.5).is_err());
        assert!(NoteEvent::new("Q", 4, 0.0, 1.0, "piano", 0.5).is_err());
        assert!(matches!(
            NoteEvent::new("C", i32::MAX, 0.0, 1.0, "piano", 0.5),
            Err(Error::InvalidPitch(_))
        ));
    }

    #[test]
    fn test_note_event_json() {
        let json = r#"{"pitch":"E","octave":4,"startOffsetBeats":1.5,"durationBeats":0.5}"#;
        let event: NoteEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.pitch(), "E");
        assert_eq!(event.start_offset_beats(), 1.5);
        assert_eq!(event.instrument(), "piano");

        let bad = r#"{"pitch":"E","octave":4,"startOffsetBeats":0,"durationBeats":-2}"#;
        assert!(serde_json::from_str::<NoteEvent>(bad).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_notes_fire_at_beat_offsets() {
        let backend = RecordingBackend::new();
        let melody = scheduler(&backend);
        let start = Instant::now();

        // 120 bpm: one beat = 500ms
        melody
            .play_melody(&[note("C", 0.0, 1.0), note("E", 1.0, 0.5), note("G", 2.5, 2.0)], 120.0)
            .unwrap();
        assert_eq!(melody.pending_count(), 3);

        tokio::time::sleep(Duration::from_secs(2)).await;

        let calls = backend.note_calls();
        assert_eq!(calls.len(), 3);
        let expected = [(0u64, 0.5), (500, 0.25), (1_250, 1.0)];
        for (call, (offset_ms, duration)) in calls.iter().zip(expected) {
            match call {
                RenderCall::Note {
                    at, duration_secs, ..
                } => {
                    assert_eq!(*at - start, Duration::from_millis(offset_ms));
                    assert!((duration_secs - duration).abs() < 1e-9);
                }
                other => panic!("Expected note, got {:?}", other),
            }
        }
        assert_eq!(melody.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_melody_cancels_first() {
        let backend = RecordingBackend::new();
        let melody = scheduler(&backend);

        melody
            .play_melody(&[note("C", 0.0, 1.0), note("C", 4.0, 1.0), note("C", 8.0, 1.0)], 60.0)
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        melody
            .play_melody(&[note("A", 0.0, 1.0), note("A", 1.0, 1.0)], 60.0)
            .unwrap();
        assert_eq!(melody.pending_count(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;

        let frequencies: Vec<f64> = backend
            .note_calls()
            .iter()
            .map(|c| match c {
                RenderCall::Note { frequency_hz, .. } => *frequency_hz,
                _ => unreachable!(),
            })
            .collect();
        // one C from the first melody, then both As
        assert_eq!(frequencies.len(), 3);
        assert!((frequencies[1] - 440.0).abs() < 1e-9);
        assert!((frequencies[2] - 440.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_far_future_note_rejected() {
        let backend = RecordingBackend::new();
        let melody = scheduler(&backend);

        melody.play_melody(&[note("C", 1.0, 1.0)], 120.0).unwrap();
        let far = note("D", 1e30, 1.0);
        assert!(matches!(
            melody.play_melody(&[note("E", 0.0, 1.0), far], 120.0),
            Err(Error::InvalidPattern(_))
        ));
        // the rejected melody leaves the current one alone
        assert_eq!(melody.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(backend.note_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_drop_cancel_outstanding() {
        let backend = RecordingBackend::new();
        let melody = scheduler(&backend);

        melody.play_melody(&[note("C", 1.0, 1.0)], 120.0).unwrap();
        melody.stop_melody();
        assert_eq!(melody.pending_count(), 0);

        melody.play_melody(&[note("D", 1.0, 1.0)], 120.0).unwrap();
        drop(melody);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(backend.note_calls().is_empty());
    }
}
