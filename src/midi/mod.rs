//! MIDI device input
//!
//! Device discovery, message decoding, input settings and the manager that
//! turns incoming notes into trigger calls.

pub mod channels;
pub mod manager;
pub mod message;
pub mod midir_platform;
pub mod platform;
pub mod settings;

pub use channels::ChannelInstrumentMap;
pub use manager::{LastNote, MidiDeviceManager};
pub use message::MidiMessage;
pub use midir_platform::MidirPlatform;
pub use platform::{
    ConnectionKind, DeviceState, MidiAccess, MidiDevice, MidiPlatform, VirtualAccess, VirtualPlatform,
};
pub use settings::{ChannelMode, MidiSettings, MidiSettingsPatch, NoteRange};
