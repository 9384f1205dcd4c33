//! Standard MIDI File import
//!
//! Flattens every note of a .mid file into a melody (`NoteEvent` list) at the
//! file's initial tempo. Later tempo changes are not applied.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::path::Path;

use super::melody::NoteEvent;
use crate::audio::pitch::{decode_note, normalize_velocity};
use crate::error::{Error, Result};
use crate::midi::channels::ChannelInstrumentMap;

/// MIDI default tempo when a file has no tempo event at tick 0
pub const DEFAULT_FILE_BPM: f64 = 120.0;

/// Shortest note we emit, in beats; zero-length notes are padded to this
const MIN_DURATION_BEATS: f64 = 0.01;

pub struct ImportedMelody {
    pub bpm: f64,
    pub notes: Vec<NoteEvent>,
    pub track_names: Vec<String>,
}

/// Load a MIDI file from disk
pub fn load_melody(path: &Path, channels: &ChannelInstrumentMap) -> Result<ImportedMelody> {
    let data = std::fs::read(path)?;
    parse_melody(&data, channels)
}

/// Parse MIDI file bytes. Instruments come from each note's channel.
pub fn parse_melody(data: &[u8], channels: &ChannelInstrumentMap) -> Result<ImportedMelody> {
    let smf = Smf::parse(data)?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as f64,
        // Rough equivalent for SMPTE timing
        Timing::Timecode(fps, tpf) => fps.as_f32() as f64 * tpf as f64 / 2.0,
    };
    if ticks_per_beat <= 0.0 {
        return Err(Error::MidiFileParse("invalid ticks per beat".to_string()));
    }

    let mut first_tempo: Option<(u64, f64)> = None;
    let mut track_names = Vec::new();
    // (start beat, note, velocity, duration, channel)
    let mut raw_notes: Vec<(f64, u8, u8, f64, u8)> = Vec::new();

    for track in &smf.tracks {
        let mut tick: u64 = 0;
        let mut sounding: HashMap<(u8, u8), (f64, u8)> = HashMap::new();

        for event in track {
            tick += u64::from(event.delta.as_int());
            let beat = tick as f64 / ticks_per_beat;

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                    let bpm = 60_000_000.0 / tempo.as_int() as f64;
                    if first_tempo.map_or(true, |(t, _)| tick < t) {
                        first_tempo = Some((tick, bpm));
                    }
                }
                TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                    if let Ok(name) = std::str::from_utf8(name) {
                        track_names.push(name.to_string());
                    }
                }
                TrackEventKind::Midi { channel, message } => {
                    let ch = channel.as_int();
                    match message {
                        MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                            sounding.insert((ch, key.as_int()), (beat, vel.as_int()));
                        }
                        MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                            if let Some((start, vel)) = sounding.remove(&(ch, key.as_int())) {
                                raw_notes.push((start, key.as_int(), vel, beat - start, ch));
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        // Close anything left hanging at the end of the track
        let end = tick as f64 / ticks_per_beat;
        for ((ch, key), (start, vel)) in sounding {
            raw_notes.push((start, key, vel, end - start, ch));
        }
    }

    if raw_notes.is_empty() {
        return Err(Error::MidiFileParse("MIDI file contains no note data".to_string()));
    }

    raw_notes.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let notes = raw_notes
        .into_iter()
        .map(|(start, key, vel, duration, ch)| {
            let (pitch, octave) = decode_note(key);
            NoteEvent::new(
                pitch,
                octave,
                start,
                duration.max(MIN_DURATION_BEATS),
                channels.instrument_for(ch),
                normalize_velocity(vel),
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let bpm = match first_tempo {
        Some((0, bpm)) => bpm,
        _ => DEFAULT_FILE_BPM,
    };

    log::info!("Imported {} notes from MIDI file at {:.1} bpm", notes.len(), bpm);

    Ok(ImportedMelody {
        bpm,
        notes,
        track_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, TrackEvent};

    fn midi_event(delta: u32, channel: u8, message: MidiMessage) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(channel),
                message,
            },
        }
    }

    fn build_file(tempo_us: Option<u32>) -> Vec<u8> {
        let mut track = Vec::new();
        if let Some(us) = tempo_us {
            track.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(us))),
            });
        }
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::TrackName(b"Lead")),
        });
        // C4 for one beat, then A4 on channel 9 for half a beat
        track.push(midi_event(0, 0, MidiMessage::NoteOn { key: u7::new(60), vel: u7::new(127) }));
        track.push(midi_event(480, 0, MidiMessage::NoteOff { key: u7::new(60), vel: u7::new(0) }));
        track.push(midi_event(0, 9, MidiMessage::NoteOn { key: u7::new(69), vel: u7::new(64) }));
        track.push(midi_event(240, 9, MidiMessage::NoteOn { key: u7::new(69), vel: u7::new(0) }));
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
            tracks: vec![track],
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_parse_melody() {
        let bytes = build_file(Some(600_000));
        let melody = parse_melody(&bytes, &ChannelInstrumentMap::default()).unwrap();

        assert!((melody.bpm - 100.0).abs() < 1e-9);
        assert_eq!(melody.track_names, vec!["Lead".to_string()]);
        assert_eq!(melody.notes.len(), 2);

        let first = &melody.notes[0];
        assert_eq!((first.pitch(), first.octave()), ("C", 4));
        assert_eq!(first.start_offset_beats(), 0.0);
        assert_eq!(first.duration_beats(), 1.0);
        assert_eq!(first.instrument(), "piano");
        assert_eq!(first.velocity(), 1.0);

        let second = &melody.notes[1];
        assert_eq!((second.pitch(), second.octave()), ("A", 4));
        assert_eq!(second.start_offset_beats(), 1.0);
        assert_eq!(second.duration_beats(), 0.5);
        assert_eq!(second.instrument(), "drums");
    }

    #[test]
    fn test_default_tempo() {
        let bytes = build_file(None);
        let melody = parse_melody(&bytes, &ChannelInstrumentMap::default()).unwrap();
        assert_eq!(melody.bpm, DEFAULT_FILE_BPM);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lead.mid");
        std::fs::write(&path, build_file(Some(500_000))).unwrap();

        let melody = load_melody(&path, &ChannelInstrumentMap::default()).unwrap();
        assert!((melody.bpm - 120.0).abs() < 1e-9);

        assert!(matches!(
            load_melody(&dir.path().join("missing.mid"), &ChannelInstrumentMap::default()),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_long_track_keeps_timing() {
        // 17 maximal deltas pass u32::MAX ticks
        let max_delta = 0x0FFF_FFFF;
        let mut track = Vec::new();
        for _ in 0..17 {
            track.push(midi_event(max_delta, 0, MidiMessage::NoteOn { key: u7::new(60), vel: u7::new(100) }));
            track.push(midi_event(480, 0, MidiMessage::NoteOff { key: u7::new(60), vel: u7::new(0) }));
        }
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(480))),
            tracks: vec![track],
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();

        let melody = parse_melody(&bytes, &ChannelInstrumentMap::default()).unwrap();
        assert_eq!(melody.notes.len(), 17);

        let last = &melody.notes[16];
        let expected_start = (17.0 * max_delta as f64 + 16.0 * 480.0) / 480.0;
        assert_eq!(last.start_offset_beats(), expected_start);
        assert!((last.duration_beats() - 1.0).abs() < 1e-6);
        assert!(melody
            .notes
            .windows(2)
            .all(|pair| pair[0].start_offset_beats() < pair[1].start_offset_beats()));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            parse_melody(b"not a midi file", &ChannelInstrumentMap::default()),
            Err(Error::MidiFileParse(_))
        ));
    }
}
