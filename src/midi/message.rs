//! Raw MIDI channel message decoding

/// Controller numbers the manager reacts to
pub const CC_MODULATION: u8 = 1;
pub const CC_SUSTAIN: u8 = 64;
pub const CC_ALL_NOTES_OFF: u8 = 123;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Also produced by a note-on with velocity 0
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    /// Centered at 0, range -8192..=8191
    PitchBend { channel: u8, value: i16 },
    /// Anything else (aftertouch, system messages)
    Other { status: u8 },
}

impl MidiMessage {
    /// Decode one message. Returns `None` for empty or truncated input.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let message_type = status & 0xF0;
        let channel = status & 0x0F;
        let data = |i: usize| bytes.get(i).map(|b| b & 0x7F);

        let message = match message_type {
            0x90 => {
                let note = data(1)?;
                match data(2)? {
                    0 => MidiMessage::NoteOff { channel, note },
                    velocity => MidiMessage::NoteOn {
                        channel,
                        note,
                        velocity,
                    },
                }
            }
            0x80 => MidiMessage::NoteOff {
                channel,
                note: data(1)?,
            },
            0xB0 => MidiMessage::ControlChange {
                channel,
                controller: data(1)?,
                value: data(2)?,
            },
            0xC0 => MidiMessage::ProgramChange {
                channel,
                program: data(1)?,
            },
            0xE0 => {
                let lsb = data(1)? as i16;
                let msb = data(2)? as i16;
                MidiMessage::PitchBend {
                    channel,
                    value: ((msb << 7) | lsb) - 8192,
                }
            }
            _ => MidiMessage::Other { status },
        };
        Some(message)
    }

    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(channel),
            MidiMessage::Other { .. } => None,
        }
    }
}
