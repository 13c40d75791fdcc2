//! Scientific pitch notation and note-value helpers.

/// MIDI number for names like `C4`, `F#6`, `Bb2` or `A-1`.
pub fn midi(name: &str) -> Option<i32> {
    let mut chars = name.trim().chars();
    let base = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (accidental, octave) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };
    let octave: i32 = octave.parse().ok()?;
    Some((octave + 1) * 12 + base + accidental)
}

/// Equal-tempered frequency, A4 = 440 Hz.
pub fn midi_to_hz(midi: i32) -> f32 {
    440.0 * 2f32.powf((midi - 69) as f32 / 12.0)
}

pub fn frequency(name: &str) -> Option<f32> {
    midi(name).map(midi_to_hz)
}

/// Length in seconds of a `1/division` note at `bpm` (so `8` is an eighth).
pub fn note_value(division: u32, bpm: f64) -> f32 {
    (60.0 / bpm * 4.0 / division.max(1) as f64) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_names() {
        assert_eq!(midi("A4"), Some(69));
        assert_eq!(midi("C4"), Some(60));
        assert_eq!(midi("C#7"), Some(97));
        assert_eq!(midi("Bb3"), Some(58));
        assert_eq!(midi("C-1"), Some(0));
        assert_eq!(midi("H2"), None);
        assert_eq!(midi("C"), None);
    }

    #[test]
    fn frequencies_match_the_phrase_tables() {
        let close = |a: f32, b: f32| (a - b).abs() < 0.05;
        assert!(close(frequency("C6").unwrap(), 1046.50));
        assert!(close(frequency("F7").unwrap(), 2793.83));
        assert!(close(frequency("A#6").unwrap(), 1864.66));
    }

    #[test]
    fn note_values_at_120() {
        assert_eq!(note_value(4, 120.0), 0.5);
        assert_eq!(note_value(8, 120.0), 0.25);
        assert_eq!(note_value(2, 120.0), 1.0);
    }
}
