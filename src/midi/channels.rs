//! MIDI channel to instrument mapping

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FALLBACK_INSTRUMENT: &str = "piano";

/// General-MIDI-like defaults, 0-indexed channels (channel 10 is percussion)
static DEFAULT_CHANNELS: Lazy<BTreeMap<u8, String>> = Lazy::new(|| {
    [
        (0, "piano"),
        (1, "guitar"),
        (2, "bass"),
        (3, "violin"),
        (4, "flute"),
        (5, "trumpet"),
        (6, "organ"),
        (7, "synth"),
        (9, "drums"),
    ]
    .into_iter()
    .map(|(ch, name)| (ch, name.to_string()))
    .collect()
});

/// Read-only channel -> instrument table, fixed at configuration time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInstrumentMap {
    channels: BTreeMap<u8, String>,
    fallback: String,
}

impl Default for ChannelInstrumentMap {
    fn default() -> Self {
        Self {
            channels: DEFAULT_CHANNELS.clone(),
            fallback: FALLBACK_INSTRUMENT.to_string(),
        }
    }
}

impl ChannelInstrumentMap {
    /// Build a custom table. Channels above 15 are ignored.
    pub fn new(channels: impl IntoIterator<Item = (u8, String)>, fallback: impl Into<String>) -> Self {
        Self {
            channels: channels.into_iter().filter(|(ch, _)| *ch < 16).collect(),
            fallback: fallback.into(),
        }
    }

    pub fn instrument_for(&self, channel: u8) -> &str {
        self.channels
            .get(&(channel & 0x0F))
            .map(String::as_str)
            .unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }
}
