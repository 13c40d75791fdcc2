//! Offline voice rendering with `fundsp`, and the `rodio` output that plays
//! the rendered buffers.
//!
//! Every sound in the game is short, so each one is rendered to a mono
//! buffer up front and handed to a detached `rodio` sink.

use std::collections::HashMap;
use std::time::Duration;

use fundsp::prelude32::{
    AudioUnit, highpass_hz, lowpass_hz, noise, pink, saw, saw_hz, sine, sine_hz, square_hz,
    triangle_hz,
};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use super::notes::{frequency, note_value};
use super::{AudioOut, BAD_ARPEGGIO, Cue, GOOD_PHRASE, MOVEMENT_SCALE, PhraseNote, RESPAWN_PHRASE};
use crate::error::AudioError;

pub const SAMPLE_RATE: u32 = 44_100;
const SR: f32 = SAMPLE_RATE as f32;

/// Tempo the fixed note values ("8n", "16n") of the effect cues refer to.
const CUE_BPM: f64 = 120.0;

pub fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

// ── Envelope ────────────────────────────────────────────────────────────────

/// Linear attack/decay/sustain/release, times in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adsr {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Adsr {
    pub const fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }

    /// Level while the gate is held, `t` seconds after the attack began.
    fn held(&self, t: f32) -> f32 {
        if t < self.attack {
            t / self.attack
        } else if t < self.attack + self.decay {
            1.0 - (1.0 - self.sustain) * (t - self.attack) / self.decay
        } else {
            self.sustain
        }
    }

    /// Level at `t` for a gate released at `gate`.
    pub fn level(&self, t: f32, gate: f32) -> f32 {
        if t < gate {
            return self.held(t);
        }
        if self.release <= 0.0 {
            return 0.0;
        }
        let from = self.held(gate);
        (from * (1.0 - (t - gate) / self.release)).max(0.0)
    }
}

// ── Patches ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Saw,
    /// Two-operator FM: a sine carrier modulated by a sine at
    /// `harmonicity × f` with depth `index × modulator frequency`.
    Fm { harmonicity: f32, index: f32 },
    /// Low-passed sawtooth.
    Bass,
    /// Triangle with a little high-passed breath noise.
    Breath,
    /// Inharmonic square cluster, high-passed.
    Metal,
    WhiteNoise,
    PinkNoise,
}

fn oscillator(waveform: Waveform, f: f32) -> Box<dyn AudioUnit> {
    match waveform {
        Waveform::Sine => Box::new(sine_hz(f)),
        Waveform::Triangle => Box::new(triangle_hz(f)),
        Waveform::Square => Box::new(square_hz(f) * 0.6),
        Waveform::Saw => Box::new(saw_hz(f) * 0.6),
        Waveform::Fm { harmonicity, index } => {
            let m = f * harmonicity;
            Box::new((sine_hz(m) * (m * index) + f) >> sine())
        }
        Waveform::Bass => Box::new(saw_hz(f) >> lowpass_hz(f * 4.0 + 300.0, 1.0)),
        Waveform::Breath => {
            Box::new(triangle_hz(f) + (noise() >> highpass_hz(1000.0, 0.7)) * 0.03)
        }
        Waveform::Metal => Box::new(
            (square_hz(f) + square_hz(f * 1.483) + square_hz(f * 2.143) + square_hz(f * 2.797))
                * 0.25
                >> highpass_hz(4000.0, 0.7),
        ),
        Waveform::WhiteNoise => Box::new(noise()),
        Waveform::PinkNoise => Box::new(pink()),
    }
}

/// An oscillator shape, its envelope and its output level.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Patch {
    pub waveform: Waveform,
    pub envelope: Adsr,
    pub volume_db: f32,
}

impl Patch {
    pub const fn new(waveform: Waveform, envelope: Adsr, volume_db: f32) -> Self {
        Self {
            waveform,
            envelope,
            volume_db,
        }
    }

    /// Renders one note held for `hold` seconds plus its release tail.
    pub fn render(&self, freq: f32, hold: f32, velocity: f32) -> Vec<f32> {
        let mut osc = oscillator(self.waveform, freq);
        osc.set_sample_rate(SR as f64);
        let hold = hold.max(0.0);
        let frames = ((hold + self.envelope.release) * SR).ceil() as usize;
        let amp = db_to_gain(self.volume_db) * velocity.clamp(0.0, 1.0);
        (0..frames)
            .map(|i| {
                let t = i as f32 / SR;
                osc.get_mono() * self.envelope.level(t, hold) * amp
            })
            .collect()
    }
}

// ── Mixdown ─────────────────────────────────────────────────────────────────

/// Mono buffer that notes are summed into at given offsets.
#[derive(Clone, Debug, Default)]
pub struct Mixdown {
    samples: Vec<f32>,
}

impl Mixdown {
    pub fn add(&mut self, at_secs: f32, note: &[f32]) {
        let start = (at_secs.max(0.0) * SR) as usize;
        let end = start + note.len();
        if self.samples.len() < end {
            self.samples.resize(end, 0.0);
        }
        for (dst, src) in self.samples[start..end].iter_mut().zip(note) {
            *dst += src;
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

// ── Effect cues ─────────────────────────────────────────────────────────────

const MOVEMENT_PATCH: Patch = Patch::new(
    Waveform::Fm {
        harmonicity: 3.0,
        index: 10.0,
    },
    Adsr::new(0.01, 0.1, 0.1, 0.1),
    -5.0,
);
const CRASH_PATCH: Patch = Patch::new(Waveform::WhiteNoise, Adsr::new(0.005, 0.1, 0.05, 0.1), -6.0);
const BAD_PATCH: Patch = Patch::new(Waveform::Triangle, Adsr::new(0.005, 0.1, 0.3, 0.05), -8.0);
const RESPAWN_PATCH: Patch = Patch::new(Waveform::Sine, Adsr::new(0.05, 0.3, 0.4, 0.5), -12.0);

fn render_phrase(patch: &Patch, phrase: &[PhraseNote]) -> Vec<f32> {
    let mut mix = Mixdown::default();
    for note in phrase {
        if let Some(f) = frequency(note.name) {
            mix.add(note.delay, &patch.render(f, note.duration, 1.0));
        }
    }
    mix.into_samples()
}

/// Plain sine with an exponential fade from 0.5 to 0.01 over `duration`.
fn render_chime(f: f32, duration: f32) -> Vec<f32> {
    let mut osc = sine_hz(f);
    osc.set_sample_rate(SR as f64);
    let frames = (duration * SR) as usize;
    let k = (0.01f32 / 0.5).ln() / duration;
    (0..frames)
        .map(|i| {
            let t = i as f32 / SR;
            osc.get_mono() * 0.5 * (k * t).exp()
        })
        .collect()
}

/// Sawtooth falling from 400 Hz to 80 Hz over 0.4 s, fading out over 0.5 s.
fn render_sweep() -> Vec<f32> {
    let mut osc = saw();
    osc.set_sample_rate(SR as f64);
    let frames = (0.5 * SR) as usize;
    (0..frames)
        .map(|i| {
            let t = i as f32 / SR;
            let f = 400.0 + (80.0 - 400.0) * (t / 0.4).min(1.0);
            let gain = 0.15 * (1.0 - t / 0.5);
            osc.filter_mono(f) * gain
        })
        .collect()
}

/// Renders the mono buffer for `cue`.
pub fn render_cue(cue: Cue) -> Vec<f32> {
    match cue {
        Cue::Movement { note } => frequency(note)
            .map(|f| MOVEMENT_PATCH.render(f, note_value(8, CUE_BPM), 1.0))
            .unwrap_or_default(),
        Cue::CrashNoise => CRASH_PATCH.render(0.0, note_value(16, CUE_BPM), 1.0),
        Cue::BadArpeggio => render_phrase(&BAD_PATCH, &BAD_ARPEGGIO),
        Cue::GoodPhrase => {
            let mut mix = Mixdown::default();
            for note in &GOOD_PHRASE {
                if let Some(f) = frequency(note.name) {
                    mix.add(note.delay, &render_chime(f, note.duration));
                }
            }
            mix.into_samples()
        }
        Cue::Respawn => render_phrase(&RESPAWN_PATCH, &RESPAWN_PHRASE),
        Cue::GameOver => render_sweep(),
    }
}

/// Every cue the game can trigger.
pub fn all_cues() -> impl Iterator<Item = Cue> {
    MOVEMENT_SCALE
        .iter()
        .map(|&note| Cue::Movement { note })
        .chain([
            Cue::CrashNoise,
            Cue::BadArpeggio,
            Cue::GoodPhrase,
            Cue::Respawn,
            Cue::GameOver,
        ])
}

// ── Output device ───────────────────────────────────────────────────────────

/// The default output device. Dropping it silences everything.
pub struct Output {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl Output {
    pub fn open() -> Result<Self, AudioError> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Self {
            _stream: stream,
            handle,
        })
    }

    pub fn handle(&self) -> &OutputStreamHandle {
        &self.handle
    }
}

/// Plays cues on a `rodio` output. All cues are rendered once at startup.
pub struct RodioOut {
    handle: OutputStreamHandle,
    cues: HashMap<Cue, Vec<f32>>,
}

impl RodioOut {
    pub fn new(output: &Output) -> Self {
        let cues: HashMap<_, _> = all_cues().map(|cue| (cue, render_cue(cue))).collect();
        debug!("rendered {} effect cues", cues.len());
        Self {
            handle: output.handle().clone(),
            cues,
        }
    }
}

impl AudioOut for RodioOut {
    fn play(&mut self, cue: Cue) {
        let Some(samples) = self.cues.get(&cue) else {
            return;
        };
        match Sink::try_new(&self.handle) {
            Ok(sink) => {
                sink.append(SamplesBuffer::new(1, SAMPLE_RATE, samples.clone()));
                sink.detach();
            }
            Err(e) => warn!("could not play {cue:?}: {e}"),
        }
    }
}

/// Seconds of audio in a mono buffer.
pub fn duration_of(samples: &[f32]) -> Duration {
    Duration::from_secs_f32(samples.len() as f32 / SR)
}
