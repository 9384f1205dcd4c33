//! MIDI input settings and partial updates

use serde::{Deserialize, Deserializer, Serialize};

pub const ALL_DEVICES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Respond on every channel
    #[default]
    Omni,
    /// Every channel, each with its own instrument
    Multi,
    /// Only `active_channel`
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRange {
    pub min: u8,
    pub max: u8,
}

impl Default for NoteRange {
    /// 88-key piano range, A0 to C8
    fn default() -> Self {
        Self { min: 21, max: 108 }
    }
}

impl NoteRange {
    pub fn contains(&self, note: u8) -> bool {
        (self.min..=self.max).contains(&note)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MidiSettings {
    /// Device id to listen to, or `"all"`
    pub input_device: String,
    /// Percent applied to incoming velocity
    #[serde(deserialize_with = "percent")]
    pub velocity_sensitivity: f32,
    pub channel_mode: ChannelMode,
    /// 1-16, only used in `Single` mode
    pub active_channel: u8,
    pub note_range: NoteRange,
    pub sustain_pedal: bool,
    pub pitch_bend: bool,
    pub modulation: bool,
    pub auto_connect: bool,
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            input_device: ALL_DEVICES.to_string(),
            velocity_sensitivity: 100.0,
            channel_mode: ChannelMode::Omni,
            active_channel: 1,
            note_range: NoteRange::default(),
            sustain_pedal: true,
            pitch_bend: true,
            modulation: true,
            auto_connect: true,
        }
    }
}

/// A partial settings update; `None` fields keep their current value
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MidiSettingsPatch {
    pub input_device: Option<String>,
    #[serde(deserialize_with = "optional_percent")]
    pub velocity_sensitivity: Option<f32>,
    pub channel_mode: Option<ChannelMode>,
    pub active_channel: Option<u8>,
    pub note_range: Option<NoteRange>,
    pub sustain_pedal: Option<bool>,
    pub pitch_bend: Option<bool>,
    pub modulation: Option<bool>,
    pub auto_connect: Option<bool>,
}

impl MidiSettings {
    /// Merge `patch` field by field. An empty patch changes nothing.
    pub fn merge(&mut self, patch: &MidiSettingsPatch) {
        if let Some(device) = &patch.input_device {
            self.input_device = device.clone();
        }
        if let Some(sensitivity) = patch.velocity_sensitivity {
            self.velocity_sensitivity = sensitivity;
        }
        if let Some(mode) = patch.channel_mode {
            self.channel_mode = mode;
        }
        if let Some(channel) = patch.active_channel {
            self.active_channel = channel;
        }
        if let Some(range) = patch.note_range {
            self.note_range = range;
        }
        if let Some(on) = patch.sustain_pedal {
            self.sustain_pedal = on;
        }
        if let Some(on) = patch.pitch_bend {
            self.pitch_bend = on;
        }
        if let Some(on) = patch.modulation {
            self.modulation = on;
        }
        if let Some(on) = patch.auto_connect {
            self.auto_connect = on;
        }
        self.normalize();
    }

    /// Pull out-of-range values back in: channel to 1..=16, an ordered note
    /// range within 0..=127, non-negative sensitivity
    pub fn normalize(&mut self) {
        self.velocity_sensitivity = self.velocity_sensitivity.max(0.0);
        self.active_channel = self.active_channel.clamp(1, 16);
        let NoteRange { min, max } = self.note_range;
        self.note_range = NoteRange {
            min: min.min(max).min(127),
            max: max.max(min).min(127),
        };
    }

    pub fn accepts_device(&self, device_id: &str) -> bool {
        self.input_device == ALL_DEVICES || self.input_device == device_id
    }

    /// `channel` is 0-indexed, `active_channel` is 1-indexed
    pub fn accepts_channel(&self, channel: u8) -> bool {
        match self.channel_mode {
            ChannelMode::Omni | ChannelMode::Multi => true,
            ChannelMode::Single => channel + 1 == self.active_channel,
        }
    }

    pub fn accepts_note(&self, note: u8) -> bool {
        self.note_range.contains(note)
    }

    /// Apply sensitivity to a 0..1 velocity, clamped back into 0..1
    pub fn scale_velocity(&self, velocity: f32) -> f32 {
        (velocity * self.velocity_sensitivity / 100.0).clamp(0.0, 1.0)
    }
}

/// Settings UIs send slider values as one-element arrays (`[80]`)
#[derive(Deserialize)]
#[serde(untagged)]
enum PercentValue {
    Scalar(f32),
    Slider(Vec<f32>),
}

impl PercentValue {
    fn value<E: serde::de::Error>(self) -> Result<f32, E> {
        match self {
            PercentValue::Scalar(v) => Ok(v),
            PercentValue::Slider(values) => values
                .first()
                .copied()
                .ok_or_else(|| E::custom("empty slider value")),
        }
    }
}

fn percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    PercentValue::deserialize(deserializer)?.value()
}

fn optional_percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f32>, D::Error> {
    match Option::<PercentValue>::deserialize(deserializer)? {
        Some(value) => value.value().map(Some),
        None => Ok(None),
    }
}
