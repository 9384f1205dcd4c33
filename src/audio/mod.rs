//! Audio session and note triggering
//!
//! - Shared session lifecycle with idempotent initialization
//! - Pitch/frequency math (12-TET, A4 = 440 Hz)
//! - Note and drum triggers that delegate to a synthesis backend

pub mod backend;
pub mod pitch;
pub mod session;
pub mod trigger;

pub use backend::{LogBackend, RecordingBackend, RenderCall, SynthBackend};
pub use session::{ObserverId, SessionState};
pub use trigger::NoteTrigger;
