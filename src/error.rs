//! Error types for the subsystems that can fail without stopping the game.
//!
//! None of these ever reach the frame loop: callers log them and carry on
//! with the feature switched off.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("failed to connect to tracker at {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
    #[error("tracker connection dropped: {0}")]
    Read(#[source] Box<tungstenite::Error>),
    #[error("malformed tracker message: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("failed to read note sequence {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("note sequence is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid note sequence structure: missing 'tracks' array")]
    MissingTracks,
    #[error("note sequence contains no notes")]
    Empty,
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device: {0}")]
    Device(#[from] rodio::StreamError),
    #[error("failed to open sink: {0}")]
    Sink(#[from] rodio::PlayError),
    #[error("sample {path} not found: {source}")]
    MissingSample {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode sample {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: rodio::decoder::DecoderError,
    },
}
