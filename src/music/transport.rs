//! Sample-accurate looping playback of a rendered note schedule.
//!
//! Every note is rendered once, when the schedule is built; the transport
//! itself only sums buffers, runs the two send effects and loops.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::instruments::InstrumentMap;
use super::sequence::Sequence;
use crate::audio::notes::note_value;
use crate::audio::synth::{SAMPLE_RATE, db_to_gain};

const SR: f64 = SAMPLE_RATE as f64;
/// Music bus level.
const BUS_DB: f32 = -10.0;
const ECHO_FEEDBACK: f32 = 0.3;
const ECHO_RETURN_DB: f32 = -6.0;

/// One note placed on the timeline, already rendered.
#[derive(Clone, Debug)]
pub struct ScheduledNote {
    pub start: usize,
    pub samples: Arc<[f32]>,
    pub left: f32,
    pub right: f32,
    pub reverb_send: f32,
    pub delay_send: f32,
}

#[derive(Clone, Debug)]
pub struct Schedule {
    /// Sorted by `start`.
    pub notes: Vec<ScheduledNote>,
    pub loop_frames: usize,
    pub bpm: f64,
}

impl Schedule {
    /// Renders every note of `seq` for playback at `bpm`.
    pub fn build(seq: &Sequence, instruments: &mut InstrumentMap, bpm: f64) -> Self {
        let scale = seq.time_scale(bpm);
        let mut rendered: HashMap<(usize, String, u64, u32), Arc<[f32]>> = HashMap::new();
        let mut notes = Vec::new();

        for (track_index, track) in seq.tracks.iter().enumerate() {
            let instrument = instruments.get_or_default(&track.name);
            let (left, right) = instrument.mix.gains();
            let mut skipped = 0;
            for note in &track.notes {
                let key = (
                    track_index,
                    note.name.clone(),
                    note.duration.to_bits(),
                    note.velocity.to_bits(),
                );
                let samples = match rendered.get(&key) {
                    Some(s) => Arc::clone(s),
                    None => match instrument.render(note, scale) {
                        Some(s) if !s.is_empty() => {
                            let s: Arc<[f32]> = s.into();
                            rendered.insert(key, Arc::clone(&s));
                            s
                        }
                        _ => {
                            skipped += 1;
                            continue;
                        }
                    },
                };
                notes.push(ScheduledNote {
                    start: (note.time.max(0.0) * scale * SR).round() as usize,
                    samples,
                    left,
                    right,
                    reverb_send: instrument.mix.reverb_send,
                    delay_send: instrument.mix.delay_send,
                });
            }
            if skipped > 0 {
                debug!("{}: skipped {skipped} silent or unpitched notes", track.name);
            }
            debug!("scheduled {} notes for {}", track.notes.len() - skipped, track.name);
        }

        notes.sort_by_key(|n| n.start);
        let loop_frames = ((seq.loop_end() * scale * SR).ceil() as usize).max(1);
        info!(
            "transport at {bpm:.2} BPM, loop end {:.2}s",
            loop_frames as f64 / SR
        );
        Self {
            notes,
            loop_frames,
            bpm,
        }
    }

    pub fn loop_duration(&self) -> Duration {
        Duration::from_secs_f64(self.loop_frames as f64 / SR)
    }
}

// ── Send effects ────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct DelayLine {
    buf: Vec<f32>,
    i: usize,
}

impl DelayLine {
    fn new(len: usize) -> Self {
        Self {
            buf: vec![0.0; len.max(1)],
            i: 0,
        }
    }

    fn read(&self) -> f32 {
        self.buf[self.i]
    }

    fn write_advance(&mut self, x: f32) {
        self.buf[self.i] = x;
        self.i = (self.i + 1) % self.buf.len();
    }
}

#[derive(Clone, Debug)]
struct Comb {
    d: DelayLine,
    feedback: f32,
    damp: f32,
    lp: f32,
}

impl Comb {
    fn process(&mut self, x: f32) -> f32 {
        let y = self.d.read();
        self.lp = y * (1.0 - self.damp) + self.lp * self.damp;
        self.d.write_advance(x + self.lp * self.feedback);
        y
    }
}

#[derive(Clone, Debug)]
struct Allpass {
    d: DelayLine,
    g: f32,
}

impl Allpass {
    fn process(&mut self, x: f32) -> f32 {
        let z = self.d.read();
        let y = z - self.g * x;
        self.d.write_advance(x + self.g * y);
        y
    }
}

/// Small Schroeder reverb: four damped combs in parallel, two all-passes.
#[derive(Clone, Debug)]
struct Reverb {
    combs: Vec<Comb>,
    allpasses: Vec<Allpass>,
}

impl Reverb {
    fn new() -> Self {
        let combs = [1116, 1188, 1277, 1356]
            .into_iter()
            .map(|len| Comb {
                d: DelayLine::new(len),
                feedback: 0.8,
                damp: 0.3,
                lp: 0.0,
            })
            .collect();
        let allpasses = [556, 441]
            .into_iter()
            .map(|len| Allpass {
                d: DelayLine::new(len),
                g: 0.5,
            })
            .collect();
        Self { combs, allpasses }
    }

    fn process(&mut self, x: f32) -> f32 {
        let mut y = self.combs.iter_mut().map(|c| c.process(x)).sum::<f32>() * 0.25;
        for ap in &mut self.allpasses {
            y = ap.process(y);
        }
        y
    }
}

// ── Transport ───────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Playing {
    samples: Arc<[f32]>,
    pos: usize,
    left: f32,
    right: f32,
    reverb_send: f32,
    delay_send: f32,
}

/// Stereo, looping `rodio` source over a [`Schedule`].
pub struct Transport {
    schedule: Arc<Schedule>,
    frame: usize,
    next: usize,
    voices: Vec<Playing>,
    reverb: Reverb,
    echo: DelayLine,
    bus_gain: f32,
    echo_gain: f32,
    pending_right: Option<f32>,
}

impl Transport {
    pub fn new(schedule: Arc<Schedule>) -> Self {
        let echo_len = (note_value(8, schedule.bpm) as f64 * SR) as usize;
        Self {
            schedule,
            frame: 0,
            next: 0,
            voices: Vec::new(),
            reverb: Reverb::new(),
            echo: DelayLine::new(echo_len),
            bus_gain: db_to_gain(BUS_DB),
            echo_gain: db_to_gain(ECHO_RETURN_DB),
            pending_right: None,
        }
    }

    /// Notes currently sounding.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    fn frame_out(&mut self) -> (f32, f32) {
        let notes = &self.schedule.notes;
        while self.next < notes.len() && notes[self.next].start <= self.frame {
            let n = &notes[self.next];
            self.voices.push(Playing {
                samples: Arc::clone(&n.samples),
                pos: 0,
                left: n.left,
                right: n.right,
                reverb_send: n.reverb_send,
                delay_send: n.delay_send,
            });
            self.next += 1;
        }

        let (mut l, mut r, mut rev, mut del) = (0.0, 0.0, 0.0, 0.0);
        for v in &mut self.voices {
            let Some(&s) = v.samples.get(v.pos) else {
                continue;
            };
            l += s * v.left;
            r += s * v.right;
            rev += s * v.reverb_send;
            del += s * v.delay_send;
            v.pos += 1;
        }
        self.voices.retain(|v| v.pos < v.samples.len());

        let wet_rev = self.reverb.process(rev);
        let echoed = self.echo.read();
        self.echo.write_advance(del + echoed * ECHO_FEEDBACK);
        let wet = wet_rev + echoed * self.echo_gain;

        self.frame += 1;
        if self.frame >= self.schedule.loop_frames {
            self.frame = 0;
            self.next = 0;
        }

        // Soft limiting in place of a bus compressor.
        (
            ((l + wet) * self.bus_gain).tanh(),
            ((r + wet) * self.bus_gain).tanh(),
        )
    }
}

impl Iterator for Transport {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        if let Some(r) = self.pending_right.take() {
            return Some(r);
        }
        let (l, r) = self.frame_out();
        self.pending_right = Some(r);
        Some(l)
    }
}

impl rodio::Source for Transport {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
