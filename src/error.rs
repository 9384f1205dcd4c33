//! Error types for the note scheduling and device-input engine

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The platform has no MIDI or audio support. Surfaced once, never retried automatically.
    #[error("Unsupported capability: {0}")]
    UnsupportedCapability(String),

    /// The user declined device permission. Retried only on explicit user action.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Transient audio session setup failure; the next `initialize()` retries.
    #[error("Audio session initialization failed: {0}")]
    InitializationFailure(String),

    /// A single render call failed in the synthesis collaborator.
    #[error("Render failed: {0}")]
    RenderFailure(String),

    #[error("Invalid pitch: {0}")]
    InvalidPitch(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid tempo: {0} bpm")]
    InvalidTempo(f64),

    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("MIDI parse error: {0}")]
    MidiFileParse(String),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::MidiFileParse(e.to_string())
    }
}

impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::UnsupportedCapability(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Reject tempos whose beat or 16th-note step is not a representable, non-zero `Duration`.
pub(crate) fn check_bpm(bpm: f64) -> Result<()> {
    let valid = bpm.is_finite()
        && bpm > 0.0
        && Duration::try_from_secs_f64(60.0 / bpm).is_ok()
        && Duration::try_from_secs_f64(60.0 / bpm / 4.0).is_ok_and(|step| step > Duration::ZERO);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidTempo(bpm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_bpm() {
        assert!(check_bpm(120.0).is_ok());
        assert!(matches!(check_bpm(0.0), Err(Error::InvalidTempo(_))));
        assert!(matches!(check_bpm(-10.0), Err(Error::InvalidTempo(_))));
        assert!(matches!(check_bpm(f64::NAN), Err(Error::InvalidTempo(_))));
        assert!(matches!(check_bpm(f64::INFINITY), Err(Error::InvalidTempo(_))));
    }

    #[test]
    fn test_check_bpm_extremes() {
        // beat longer than Duration can hold
        assert!(matches!(check_bpm(1e-300), Err(Error::InvalidTempo(_))));
        // step shorter than a nanosecond
        assert!(matches!(check_bpm(1e12), Err(Error::InvalidTempo(_))));
        assert!(check_bpm(0.001).is_ok());
        assert!(check_bpm(100_000.0).is_ok());
    }

    #[test]
    fn test_display() {
        let err = Error::AccessDenied("user declined".to_string());
        assert_eq!(err.to_string(), "Access denied: user declined");
    }
}
