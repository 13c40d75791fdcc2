//! Hand-tracker client.
//!
//! The tracker process serves one JSON object per tracking frame over a
//! WebSocket. A background thread owns the socket, parses each message and
//! forwards [`TrackerEvent`]s over an `mpsc` channel; the game drains the
//! channel at the top of every frame, so tracker data never races the frame
//! step.

use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, trace, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::error::TrackerError;
use crate::exercise::{DEFAULT_PINCH, ExerciseKind, NEUTRAL_VALUE};

/// How long a blocking read may wait before the thread rechecks shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

// ── Wire format ────────────────────────────────────────────────────────────

/// One tracking frame. Only the fields the game reads are modelled; the
/// tracker also sends finger, joint, wrist and palm data.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackerFrame {
    #[serde(default)]
    pub hand_present: bool,
    #[serde(default)]
    pub distances: Option<Distances>,
    #[serde(default)]
    pub metrics: Option<Metrics>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Distances {
    pub thumb_index: Option<f32>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub make_a_fist: Option<f32>,
    pub pronation_supination: Option<f32>,
    #[serde(rename = "wristAROM")]
    pub wrist_arom: Option<f32>,
}

impl TrackerFrame {
    pub fn parse(text: &str) -> Result<Self, TrackerError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Raw metric for `kind`, with the documented fallbacks for a missing
    /// hand or field.
    pub fn value_for(&self, kind: ExerciseKind) -> f32 {
        if !self.hand_present {
            return NEUTRAL_VALUE;
        }
        let metrics = self.metrics.as_ref();
        match kind {
            ExerciseKind::ThumbIndexPinch => Some(
                self.distances
                    .as_ref()
                    .and_then(|d| d.thumb_index)
                    .unwrap_or(DEFAULT_PINCH),
            ),
            ExerciseKind::MakeAFist => metrics.and_then(|m| m.make_a_fist),
            ExerciseKind::PronationSupination => metrics.and_then(|m| m.pronation_supination),
            ExerciseKind::WristArom => metrics.and_then(|m| m.wrist_arom),
        }
        .unwrap_or(NEUTRAL_VALUE)
    }
}

// ── Message-rate meter ─────────────────────────────────────────────────────

/// Counts messages and reports the count once per second.
#[derive(Debug)]
pub struct RateMeter {
    count: u32,
    window_start: Instant,
}

impl RateMeter {
    pub fn new(now: Instant) -> Self {
        Self {
            count: 0,
            window_start: now,
        }
    }

    /// Records one message; returns the rate when a full second has passed.
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        self.count += 1;
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            let rate = self.count;
            self.count = 0;
            self.window_start = now;
            Some(rate)
        } else {
            None
        }
    }
}

// ── Events and sources ─────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum TrackerEvent {
    Connected,
    Disconnected,
    Frame(TrackerFrame),
    /// Messages received during the last second.
    Rate(u32),
}

/// Anything that can deliver [`TrackerEvent`]s over a channel.
pub trait FrameSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<TrackerEvent>, shutdown: Arc<AtomicBool>);
}

/// Receiving end of a running frame source.
pub struct TrackerHandle {
    rx: Receiver<TrackerEvent>,
    shutdown: Arc<AtomicBool>,
    _thread: JoinHandle<()>,
}

impl TrackerHandle {
    /// Everything received since the last call, without blocking.
    pub fn drain(&self) -> impl Iterator<Item = TrackerEvent> + '_ {
        self.rx.try_iter()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns `source` on its own thread and returns the receiving end.
pub fn spawn_tracker<S: FrameSource>(source: S) -> TrackerHandle {
    let (tx, rx) = mpsc::channel();
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let thread = thread::spawn(move || Box::new(source).run(tx, flag));
    TrackerHandle {
        rx,
        shutdown,
        _thread: thread,
    }
}

// ── WebSocket source ───────────────────────────────────────────────────────

/// Reads frames from the tracker's WebSocket server, reconnecting after
/// `reconnect_delay` whenever the connection fails or closes.
pub struct WsTracker {
    pub url: String,
    pub reconnect_delay: Duration,
}

impl FrameSource for WsTracker {
    fn run(self: Box<Self>, tx: Sender<TrackerEvent>, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::Relaxed) {
            match self.session(&tx, &shutdown) {
                Ok(()) => info!("tracker connection closed"),
                Err(e) => warn!("{e}"),
            }
            if tx.send(TrackerEvent::Disconnected).is_err() {
                return;
            }
            sleep_unless(&shutdown, self.reconnect_delay);
        }
    }
}

impl WsTracker {
    /// One connection lifetime. Returns `Ok` on a clean close or shutdown.
    fn session(&self, tx: &Sender<TrackerEvent>, shutdown: &AtomicBool) -> Result<(), TrackerError> {
        let (mut socket, _) =
            tungstenite::connect(self.url.as_str()).map_err(|e| TrackerError::Connect {
                url: self.url.clone(),
                source: Box::new(e),
            })?;
        set_poll_timeout(&mut socket);
        info!("tracker connection established at {}", self.url);
        if tx.send(TrackerEvent::Connected).is_err() {
            return Ok(());
        }

        let mut meter = RateMeter::new(Instant::now());
        while !shutdown.load(Ordering::Relaxed) {
            let msg = match socket.read() {
                Ok(msg) => msg,
                Err(tungstenite::Error::Io(e))
                    if matches!(
                        e.kind(),
                        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                    ) =>
                {
                    continue;
                }
                Err(tungstenite::Error::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(TrackerError::Read(Box::new(e))),
            };

            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => return Ok(()),
                _ => continue,
            };

            match TrackerFrame::parse(&text) {
                Ok(frame) => {
                    trace!(?frame, "tracker frame");
                    if tx.send(TrackerEvent::Frame(frame)).is_err() {
                        return Ok(());
                    }
                }
                Err(e) => warn!("error parsing tracker data: {e}"),
            }

            if let Some(rate) = meter.record(Instant::now()) {
                debug!("tracker message rate: {rate}/s");
                if tx.send(TrackerEvent::Rate(rate)).is_err() {
                    return Ok(());
                }
            }
        }
        let _ = socket.close(None);
        Ok(())
    }
}

fn set_poll_timeout(socket: &mut WebSocket<MaybeTlsStream<TcpStream>>) {
    if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
        if let Err(e) = stream.set_read_timeout(Some(POLL_INTERVAL)) {
            warn!("could not set tracker read timeout: {e}");
        }
    }
}

fn sleep_unless(shutdown: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while !shutdown.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(POLL_INTERVAL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"{
        "timestamp": "2024-07-29 10:00:00",
        "handPresent": true,
        "distances": {"thumbIndex": 52.5, "thumbMiddle": 60.1},
        "metrics": {"makeAFist": 0.4, "pronationSupination": 0.7, "wristAROM": 0.2},
        "palm": {"x": 1.0, "y": 2.0, "z": 3.0}
    }"#;

    #[test]
    fn picks_the_field_for_each_exercise() {
        let frame = TrackerFrame::parse(FULL).unwrap();
        assert_eq!(frame.value_for(ExerciseKind::ThumbIndexPinch), 52.5);
        assert_eq!(frame.value_for(ExerciseKind::MakeAFist), 0.4);
        assert_eq!(frame.value_for(ExerciseKind::PronationSupination), 0.7);
        assert_eq!(frame.value_for(ExerciseKind::WristArom), 0.2);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let frame = TrackerFrame::parse(r#"{"handPresent": true, "metrics": {}}"#).unwrap();
        assert_eq!(frame.value_for(ExerciseKind::ThumbIndexPinch), 70.0);
        assert_eq!(frame.value_for(ExerciseKind::MakeAFist), 0.5);
        assert_eq!(frame.value_for(ExerciseKind::WristArom), 0.5);

        let frame = TrackerFrame::parse(r#"{"handPresent": true, "distances": null}"#).unwrap();
        assert_eq!(frame.value_for(ExerciseKind::ThumbIndexPinch), 70.0);
    }

    #[test]
    fn absent_hand_reads_neutral() {
        let frame = TrackerFrame::parse(r#"{"handPresent": false}"#).unwrap();
        assert_eq!(frame.value_for(ExerciseKind::ThumbIndexPinch), 0.5);
        assert_eq!(frame.value_for(ExerciseKind::PronationSupination), 0.5);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            TrackerFrame::parse("{handPresent: tru"),
            Err(TrackerError::Parse(_))
        ));
    }

    #[test]
    fn rate_meter_reports_once_per_second() {
        let t0 = Instant::now();
        let mut meter = RateMeter::new(t0);
        for i in 1..60 {
            assert_eq!(meter.record(t0 + Duration::from_millis(i * 10)), None);
        }
        assert_eq!(meter.record(t0 + Duration::from_millis(1000)), Some(60));
        assert_eq!(meter.record(t0 + Duration::from_millis(1010)), None);
    }

    struct Scripted(Vec<TrackerEvent>);

    impl FrameSource for Scripted {
        fn run(self: Box<Self>, tx: Sender<TrackerEvent>, _shutdown: Arc<AtomicBool>) {
            for ev in self.0 {
                let _ = tx.send(ev);
            }
        }
    }

    #[test]
    fn spawned_source_delivers_in_order() {
        let frame = TrackerFrame::parse(FULL).unwrap();
        let handle = spawn_tracker(Scripted(vec![
            TrackerEvent::Connected,
            TrackerEvent::Frame(frame.clone()),
        ]));
        let mut got = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(2);
        while got.len() < 2 && Instant::now() < deadline {
            got.extend(handle.drain());
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(got, vec![TrackerEvent::Connected, TrackerEvent::Frame(frame)]);
    }
}
