//! Pattern and melody playback
//!
//! Provides the 16-step drum sequencer, one-shot melody scheduling and MIDI file import.

pub mod file;
pub mod melody;
pub mod step;

pub use file::{load_melody, parse_melody, ImportedMelody};
pub use melody::{MelodyScheduler, NoteEvent};
pub use step::{step_duration, Pattern, StepSequencer, STEPS};
