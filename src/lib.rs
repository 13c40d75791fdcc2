//! Hand-tracking rehabilitation mini-game for the terminal.
//!
//! An external tracker streams exercise metrics (pinch distance, fist
//! closure, wrist angles) over WebSocket. The chosen metric steers a player
//! circle up and down to collect good obstacles and dodge bad ones, with
//! synthesized sound effects and a looping background band.

pub mod audio;
pub mod config;
pub mod error;
pub mod exercise;
pub mod music;
pub mod obstacle;
pub mod player;
pub mod render;
pub mod session;
pub mod tracker;
