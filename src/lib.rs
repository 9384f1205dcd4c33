//! Real-time note scheduling and MIDI device input
//!
//! Drum patterns, melodies and live MIDI notes all end up as trigger calls
//! against one shared audio session, which a synthesis backend renders.

pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod midi;
pub mod notify;
pub mod sequencer;

pub use audio::{LogBackend, NoteTrigger, SessionState, SynthBackend};
pub use config::EngineConfig;
pub use engine::Studio;
pub use error::{Error, Result};
pub use notify::{LogNotifier, Notice, NoticeKind, Notifier};
pub use sequencer::{NoteEvent, Pattern};
