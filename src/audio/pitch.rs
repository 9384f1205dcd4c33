//! Pitch names, MIDI note numbers and 12-TET frequencies

use crate::error::{Error, Result};

/// Pitch class names, indexed by `note % 12`
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// MIDI note number of A4
pub const A4_NOTE: i32 = 69;

pub const A4_FREQUENCY: f64 = 440.0;

/// Semitones above C for a pitch name, before wrapping (`Cb` is -1, `B#` is 12).
///
/// Accepts naturals, sharps (`C#`, `Cs`) and flats (`Db`), any case.
fn semitones_from_c(name: &str) -> Result<i32> {
    let name = name.trim();
    let mut chars = name.chars();
    let letter = chars
        .next()
        .ok_or_else(|| Error::InvalidPitch(name.to_string()))?;

    let base = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return Err(Error::InvalidPitch(name.to_string())),
    };

    let mut offset = 0;
    for accidental in chars {
        match accidental {
            '#' | 's' | 'S' => offset += 1,
            'b' | 'B' => offset -= 1,
            _ => return Err(Error::InvalidPitch(name.to_string())),
        }
    }

    Ok(base + offset)
}

/// Parse a pitch class name into 0..12
pub fn pitch_class(name: &str) -> Result<i32> {
    Ok(semitones_from_c(name)?.rem_euclid(12))
}

/// Note index for a pitch in an octave, on the MIDI numbering (C4 = 60).
/// `Cb4` is B3 (59), `B#3` is C4 (60).
pub fn note_index(pitch: &str, octave: i32) -> Result<i32> {
    let semitones = semitones_from_c(pitch)?;
    octave
        .checked_add(1)
        .and_then(|o| o.checked_mul(12))
        .and_then(|base| base.checked_add(semitones))
        .ok_or_else(|| Error::InvalidPitch(format!("{}{}", pitch, octave)))
}

/// Frequency of a note index relative to A4 = 440 Hz
#[inline]
pub fn index_to_frequency(index: i32) -> f64 {
    A4_FREQUENCY * 2f64.powf((index as f64 - A4_NOTE as f64) / 12.0)
}

pub fn pitch_to_frequency(pitch: &str, octave: i32) -> Result<f64> {
    Ok(index_to_frequency(note_index(pitch, octave)?))
}

/// Split a MIDI note number into pitch class name and octave
#[inline]
pub fn decode_note(note: u8) -> (&'static str, i32) {
    let octave = (note / 12) as i32 - 1;
    (NOTE_NAMES[(note % 12) as usize], octave)
}

/// Display name such as `"C4"` or `"F#-1"`
pub fn midi_note_name(note: u8) -> String {
    let (pitch, octave) = decode_note(note);
    format!("{}{}", pitch, octave)
}

/// MIDI velocity (0-127) to 0.0-1.0
#[inline]
pub fn normalize_velocity(velocity: u8) -> f32 {
    velocity.min(127) as f32 / 127.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_reference_frequencies() {
        assert!(approx(pitch_to_frequency("A", 4).unwrap(), 440.0));
        assert!(approx(pitch_to_frequency("A", 5).unwrap(), 880.0));
        assert!(approx(pitch_to_frequency("A", 3).unwrap(), 220.0));
        assert!((pitch_to_frequency("C", 4).unwrap() - 261.625_565).abs() < 1e-3);
    }

    #[test]
    fn test_accidentals() {
        assert_eq!(pitch_class("C#").unwrap(), 1);
        assert_eq!(pitch_class("Db").unwrap(), 1);
        assert_eq!(pitch_class("fs").unwrap(), 6);
        assert_eq!(pitch_class("Bb").unwrap(), 10);
        assert_eq!(pitch_class("Cb").unwrap(), 11);
        assert!(matches!(pitch_class("H"), Err(Error::InvalidPitch(_))));
        assert!(matches!(pitch_class(""), Err(Error::InvalidPitch(_))));
        assert!(matches!(pitch_class("C4"), Err(Error::InvalidPitch(_))));
        assert_eq!(note_index("Cb", 4).unwrap(), 59);
        assert_eq!(note_index("B#", 3).unwrap(), 60);
    }

    #[test]
    fn test_decode_note() {
        assert_eq!(decode_note(60), ("C", 4));
        assert_eq!(decode_note(69), ("A", 4));
        assert_eq!(decode_note(0), ("C", -1));
        assert_eq!(decode_note(127), ("G", 9));
        assert_eq!(midi_note_name(61), "C#4");
    }

    #[test]
    fn test_decode_matches_index() {
        for note in 0..=127u8 {
            let (pitch, octave) = decode_note(note);
            assert_eq!(note_index(pitch, octave).unwrap(), note as i32);
        }
    }

    #[test]
    fn test_extreme_octaves_rejected() {
        assert!(matches!(note_index("C", i32::MAX), Err(Error::InvalidPitch(_))));
        assert!(matches!(note_index("B", i32::MAX / 12), Err(Error::InvalidPitch(_))));
        assert!(matches!(pitch_to_frequency("C", i32::MIN), Err(Error::InvalidPitch(_))));
        assert_eq!(note_index("C", -1).unwrap(), 0);
    }

    #[test]
    fn test_normalize_velocity() {
        assert_eq!(normalize_velocity(127), 1.0);
        assert!((normalize_velocity(1) - 0.007_874).abs() < 1e-5);
        assert_eq!(normalize_velocity(0), 0.0);
    }
}
