//! Background music: a MIDI-exported note sequence played by a small
//! synthesized band.
//!
//! Loading (decoding samples, rendering every note) happens once, on a
//! helper thread. Until it finishes, or if it fails, the game simply runs
//! without music.

pub mod instruments;
pub mod sequence;
pub mod transport;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use rodio::{OutputStreamHandle, Sink};
use tracing::{debug, error, info, warn};

use crate::error::SequenceError;
use instruments::InstrumentMap;
use sequence::Sequence;
use transport::{Schedule, Transport};

enum LoadState {
    Loading(Receiver<Result<Arc<Schedule>, SequenceError>>),
    Ready(Arc<Schedule>),
    Unavailable,
}

pub struct MusicPlayer {
    handle: Option<OutputStreamHandle>,
    state: LoadState,
    sink: Option<Sink>,
    wanted: bool,
}

impl MusicPlayer {
    /// A player that never makes a sound.
    pub fn disabled() -> Self {
        Self {
            handle: None,
            state: LoadState::Unavailable,
            sink: None,
            wanted: false,
        }
    }

    /// Starts loading in the background. `bpm` overrides the file tempo.
    pub fn load(
        handle: Option<OutputStreamHandle>,
        sequence: PathBuf,
        samples_dir: PathBuf,
        bpm: Option<f64>,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("music-loader".into())
            .spawn(move || {
                let result = Sequence::load(&sequence).map(|seq| {
                    let mut band = InstrumentMap::build(&samples_dir);
                    let bpm = bpm.unwrap_or(seq.bpm);
                    Arc::new(Schedule::build(&seq, &mut band, bpm))
                });
                let _ = tx.send(result);
            });
        let state = match spawned {
            Ok(_) => LoadState::Loading(rx),
            Err(e) => {
                error!("could not start music loader: {e}");
                LoadState::Unavailable
            }
        };
        Self {
            handle,
            state,
            sink: None,
            wanted: false,
        }
    }

    /// Picks up a finished load and starts playback if it was requested
    /// in the meantime. Call once per frame.
    pub fn poll(&mut self) {
        if let LoadState::Loading(rx) = &self.state {
            self.state = match rx.try_recv() {
                Ok(Ok(schedule)) => {
                    info!(
                        "music ready: {} notes, {:.1}s loop",
                        schedule.notes.len(),
                        schedule.loop_duration().as_secs_f32()
                    );
                    LoadState::Ready(schedule)
                }
                Ok(Err(e)) => {
                    error!("could not load music: {e}");
                    LoadState::Unavailable
                }
                Err(TryRecvError::Empty) => return,
                Err(TryRecvError::Disconnected) => {
                    error!("music loader exited without a result");
                    LoadState::Unavailable
                }
            };
        }
        if self.wanted && self.sink.is_none() {
            self.begin();
        }
    }

    fn begin(&mut self) {
        let (LoadState::Ready(schedule), Some(handle)) = (&self.state, &self.handle) else {
            return;
        };
        match Sink::try_new(handle) {
            Ok(sink) => {
                sink.append(Transport::new(Arc::clone(schedule)));
                info!("music started");
                self.sink = Some(sink);
            }
            Err(e) => {
                warn!("could not start music: {e}");
                self.wanted = false;
            }
        }
    }

    pub fn start(&mut self) {
        if self.sink.is_some() {
            return;
        }
        self.wanted = true;
        if matches!(self.state, LoadState::Loading(_)) {
            debug!("music still loading, will start when ready");
        }
        self.poll();
    }

    pub fn stop(&mut self) {
        self.wanted = false;
        if let Some(sink) = self.sink.take() {
            sink.stop();
            info!("music stopped");
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LoadState::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading(_))
    }

    pub fn is_playing(&self) -> bool {
        self.sink.is_some()
    }
}
