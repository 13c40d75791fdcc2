//! Note sequences exported from a MIDI file as JSON.
//!
//! ```json
//! { "header": { "tempos": [{ "bpm": 120 }] },
//!   "tracks": [{ "name": "Bass",
//!                "notes": [{ "name": "C2", "time": 0.0, "duration": 0.5, "velocity": 0.8 }] }] }
//! ```
//!
//! Times and durations are seconds at the file's own tempo.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::SequenceError;

/// Tempo used when the file does not carry one.
pub const DEFAULT_BPM: f64 = 192.999_893_850_058_38;

#[derive(Deserialize)]
struct RawSequence {
    #[serde(default)]
    header: Option<RawHeader>,
    #[serde(default)]
    tracks: Option<Vec<RawTrack>>,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    tempos: Vec<RawTempo>,
}

#[derive(Deserialize)]
struct RawTempo {
    bpm: Option<f64>,
}

#[derive(Deserialize)]
struct RawTrack {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    notes: Option<Vec<Note>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Note {
    pub name: String,
    pub time: f64,
    pub duration: f64,
    #[serde(default = "full_velocity")]
    pub velocity: f32,
}

fn full_velocity() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub name: String,
    pub notes: Vec<Note>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    /// Tempo the note times were written at.
    pub bpm: f64,
    pub tracks: Vec<Track>,
}

impl Sequence {
    pub fn load(path: &Path) -> Result<Self, SequenceError> {
        let text = fs::read_to_string(path).map_err(|source| SequenceError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let seq = Self::from_json(&text)?;
        info!(
            "loaded {} ({} tracks, {:.2} BPM)",
            path.display(),
            seq.tracks.len(),
            seq.bpm
        );
        Ok(seq)
    }

    pub fn from_json(text: &str) -> Result<Self, SequenceError> {
        let raw: RawSequence = serde_json::from_str(text)?;
        let raw_tracks = raw.tracks.ok_or(SequenceError::MissingTracks)?;

        let bpm = raw
            .header
            .and_then(|h| h.tempos.into_iter().next())
            .and_then(|t| t.bpm)
            .filter(|bpm| *bpm > 0.0)
            .unwrap_or(DEFAULT_BPM);

        let mut tracks = Vec::new();
        for (index, track) in raw_tracks.into_iter().enumerate() {
            let name = track.name.unwrap_or_else(|| format!("Instrument {index}"));
            match track.notes {
                Some(notes) if !notes.is_empty() => tracks.push(Track { name, notes }),
                _ => debug!("no notes found on track {index} ({name})"),
            }
        }
        if tracks.is_empty() {
            return Err(SequenceError::Empty);
        }
        Ok(Self { bpm, tracks })
    }

    /// End of the last note, in seconds at the file tempo.
    pub fn loop_end(&self) -> f64 {
        self.notes()
            .map(|(_, n)| n.time + n.duration)
            .fold(0.0, f64::max)
    }

    /// Every note with the index of its track.
    pub fn notes(&self) -> impl Iterator<Item = (usize, &Note)> {
        self.tracks
            .iter()
            .enumerate()
            .flat_map(|(i, t)| t.notes.iter().map(move |n| (i, n)))
    }

    /// Factor that converts file seconds into playback seconds at `bpm`.
    pub fn time_scale(&self, bpm: f64) -> f64 {
        if bpm > 0.0 { self.bpm / bpm } else { 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONG: &str = r#"{
        "header": { "name": "PinchSong", "tempos": [{ "bpm": 120, "ticks": 0 }] },
        "tracks": [
            { "name": "Kick", "notes": [
                { "name": "C1", "time": 0.0, "duration": 0.1, "velocity": 0.9 },
                { "name": "C1", "time": 1.0, "duration": 0.1, "velocity": 0.9 } ] },
            { "name": "Bass", "notes": [
                { "name": "C2", "time": 0.5, "duration": 1.5 } ] },
            { "name": "Empty", "notes": [] },
            { "notes": [ { "name": "G4", "time": 0.25, "duration": 0.25, "velocity": 0.5 } ] }
        ]
    }"#;

    #[test]
    fn parses_tracks_tempo_and_loop_end() {
        let seq = Sequence::from_json(SONG).unwrap();
        assert_eq!(seq.bpm, 120.0);
        let names: Vec<_> = seq.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Kick", "Bass", "Instrument 3"]);
        assert_eq!(seq.tracks[1].notes[0].velocity, 1.0);
        assert_eq!(seq.loop_end(), 2.0);
        assert_eq!(seq.notes().count(), 4);
    }

    #[test]
    fn missing_tempo_uses_default() {
        let seq = Sequence::from_json(
            r#"{ "header": {}, "tracks": [{ "name": "Piano", "notes": [
                { "name": "C4", "time": 0, "duration": 1 } ] }] }"#,
        )
        .unwrap();
        assert_eq!(seq.bpm, DEFAULT_BPM);
        assert!((seq.time_scale(DEFAULT_BPM) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn missing_tracks_is_an_error() {
        assert!(matches!(
            Sequence::from_json(r#"{ "header": {} }"#),
            Err(SequenceError::MissingTracks)
        ));
        assert!(matches!(
            Sequence::from_json("not json"),
            Err(SequenceError::Json(_))
        ));
        assert!(matches!(
            Sequence::from_json(r#"{ "tracks": [] }"#),
            Err(SequenceError::Empty)
        ));
    }

    #[test]
    fn faster_playback_shrinks_time() {
        let seq = Sequence::from_json(SONG).unwrap();
        assert_eq!(seq.time_scale(240.0), 0.5);
    }
}
