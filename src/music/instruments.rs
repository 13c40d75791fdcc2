//! The background band: named instruments, how each one sounds, and where it
//! sits in the mix.
//!
//! Each instrument's [`Voice`] is fixed when it is built, so playback never
//! has to ask an instrument what it can do.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rodio::Decoder;
use rodio::source::UniformSourceIterator;
use tracing::{info, warn};

use super::sequence::Note;
use crate::audio::notes::frequency;
use crate::audio::synth::{Adsr, Patch, SAMPLE_RATE, Waveform};
use crate::error::AudioError;

/// How an instrument turns a note into sound.
#[derive(Clone, Debug)]
pub enum Voice {
    /// Plays a recorded sample; pitch and duration are ignored.
    Player(Arc<[f32]>),
    /// Pitched; the gate is held for the note's duration, then released.
    Sustained(Patch),
    /// Unpitched hit whose envelope always runs to completion.
    OneShot(Patch),
}

/// Placement in the mix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MixSettings {
    /// -1 (left) to 1 (right).
    pub pan: f32,
    pub level_db: f32,
    pub reverb_send: f32,
    pub delay_send: f32,
}

impl MixSettings {
    pub const CENTER: MixSettings = MixSettings {
        pan: 0.0,
        level_db: 0.0,
        reverb_send: 0.0,
        delay_send: 0.0,
    };

    /// Equal-power left/right gains including the level.
    pub fn gains(&self) -> (f32, f32) {
        let level = crate::audio::synth::db_to_gain(self.level_db);
        let angle = (self.pan.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
        (angle.cos() * level, angle.sin() * level)
    }
}

#[derive(Clone, Debug)]
pub struct Instrument {
    pub name: String,
    pub voice: Voice,
    pub mix: MixSettings,
}

impl Instrument {
    /// Mono rendering of `note`, or `None` if the note name is not a pitch
    /// a pitched voice can play.
    pub fn render(&self, note: &Note, time_scale: f64) -> Option<Vec<f32>> {
        let velocity = note.velocity.clamp(0.0, 1.0);
        match &self.voice {
            Voice::Player(sample) => Some(sample.iter().map(|s| s * velocity).collect()),
            Voice::Sustained(patch) => {
                let f = frequency(&note.name)?;
                Some(patch.render(f, (note.duration * time_scale) as f32, velocity))
            }
            Voice::OneShot(patch) => {
                let f = frequency(&note.name).unwrap_or(200.0);
                Some(patch.render(f, patch.envelope.attack + patch.envelope.decay, velocity))
            }
        }
    }
}

// ── The band ────────────────────────────────────────────────────────────────

/// Instrument names in the order they are built.
pub const BAND: [&str; 10] = [
    "Kick",
    "Snare",
    "Hats",
    "Bass",
    "Chords",
    "Piano",
    "Poly Synth",
    "Melody High",
    "Melody Low",
    "Flute",
];

/// Static pan / level / reverb send / delay send table.
pub fn mix_for(name: &str) -> MixSettings {
    let (pan, level_db, reverb_send, delay_send) = match name {
        "Kick" => (0.0, 2.0, 0.0, 0.0),
        "Snare" => (0.2, 2.0, 0.2, 0.1),
        "Hats" => (-0.2, -6.0, 0.1, 0.05),
        "Bass" => (0.0, 5.0, 0.0, 0.0),
        "Chords" => (-0.9, 6.0, 0.3, 0.15),
        "Piano" => (-0.1, 5.0, 0.2, 0.1),
        "Poly Synth" => (0.9, 0.0, 0.25, 0.2),
        "Melody High" => (1.0, 0.0, 0.15, 0.25),
        "Melody Low" => (-1.0, 0.0, 0.15, 0.25),
        "Flute" => (1.0, 0.0, 0.2, 0.2),
        _ => return MixSettings::CENTER,
    };
    MixSettings {
        pan,
        level_db,
        reverb_send,
        delay_send,
    }
}

/// Synth used for tracks whose instrument is missing.
pub fn default_synth(name: &str) -> Instrument {
    Instrument {
        name: name.to_string(),
        voice: Voice::Sustained(Patch::new(
            Waveform::Triangle,
            Adsr::new(0.005, 0.1, 0.3, 1.0),
            -6.0,
        )),
        mix: MixSettings::CENTER,
    }
}

/// Band voices play at unity gain; their level comes from [`mix_for`] alone.
fn band_patch(waveform: Waveform, envelope: Adsr) -> Patch {
    Patch::new(waveform, envelope, 0.0)
}

fn voice_for(name: &str, samples_dir: &Path) -> Result<Voice, AudioError> {
    let voice = match name {
        "Kick" => Voice::Player(load_sample(&samples_dir.join("drums/Kick.mp3"), 0.0)?),
        "Snare" => Voice::Player(load_sample(&samples_dir.join("drums/Snare.mp3"), 0.0)?),
        "Hats" => Voice::OneShot(band_patch(Waveform::Metal, Adsr::new(0.001, 0.1, 0.0, 0.01))),
        "Bass" => Voice::Sustained(band_patch(Waveform::Bass, Adsr::new(0.1, 0.3, 0.4, 1.4))),
        "Chords" => Voice::Sustained(band_patch(Waveform::Saw, Adsr::new(0.01, 0.2, 0.8, 0.1))),
        "Piano" => Voice::Sustained(band_patch(
            Waveform::Fm {
                harmonicity: 1.0,
                index: 0.8,
            },
            Adsr::new(0.005, 0.8, 0.2, 0.5),
        )),
        "Poly Synth" => Voice::Sustained(band_patch(
            Waveform::Saw,
            Adsr::new(0.005, 0.1, 0.3, 1.0),
        )),
        "Melody High" => Voice::Sustained(band_patch(
            Waveform::Square,
            Adsr::new(0.005, 0.1, 0.3, 1.0),
        )),
        "Melody Low" => Voice::Sustained(band_patch(
            Waveform::Square,
            Adsr::new(0.005, 0.1, 0.3, 1.0),
        )),
        "Flute" => Voice::Sustained(band_patch(Waveform::Breath, Adsr::new(0.02, 0.2, 0.6, 0.5))),
        _ => return Ok(default_synth(name).voice),
    };
    Ok(voice)
}

/// Decodes a sample file to mono at the engine rate, scaled by `volume_db`.
pub fn load_sample(path: &Path, volume_db: f32) -> Result<Arc<[f32]>, AudioError> {
    let file = File::open(path).map_err(|source| AudioError::MissingSample {
        path: path.to_path_buf(),
        source,
    })?;
    let decoder = Decoder::new(BufReader::new(file)).map_err(|source| AudioError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let gain = crate::audio::synth::db_to_gain(volume_db);
    let mono: UniformSourceIterator<_, f32> = UniformSourceIterator::new(decoder, 1, SAMPLE_RATE);
    Ok(mono.map(|s| s * gain).collect())
}

/// Name → instrument, with a default synth standing in for anything missing.
#[derive(Clone, Debug, Default)]
pub struct InstrumentMap {
    instruments: HashMap<String, Instrument>,
}

impl InstrumentMap {
    /// Builds the whole band. Instruments that fail to build are logged and
    /// left out.
    pub fn build(samples_dir: &Path) -> Self {
        let mut map = Self::default();
        for name in BAND {
            match voice_for(name, samples_dir) {
                Ok(voice) => map.insert(Instrument {
                    name: name.to_string(),
                    voice,
                    mix: mix_for(name),
                }),
                Err(e) => warn!("error initialising {name}: {e}"),
            }
        }
        info!("instruments initialised: {:?}", map.names());
        map
    }

    pub fn insert(&mut self, instrument: Instrument) {
        self.instruments.insert(instrument.name.clone(), instrument);
    }

    pub fn get(&self, name: &str) -> Option<&Instrument> {
        self.instruments.get(name)
    }

    /// The instrument for `name`, substituting (and remembering) the
    /// default synth when there is none.
    pub fn get_or_default(&mut self, name: &str) -> &Instrument {
        if !self.instruments.contains_key(name) {
            warn!("instrument {name} not found, using default synth");
            self.insert(default_synth(name));
        }
        &self.instruments[name]
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.instruments.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }
}
