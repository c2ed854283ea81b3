//! JBX audio player
//!
//! Playback engine of the JBX jukebox: backend abstraction over the audio
//! device, the per-buffer processing pipeline (auto-volume, equalizer,
//! fades), and the player orchestration with crossfade scheduling, a
//! prelisten path and resume persistence.

pub mod backend;
pub mod config;
pub mod dsp;
pub mod error;
pub mod library;
pub mod player;
pub mod queue;
pub mod signals;
pub mod stream;
pub mod vis;

pub use config::PlayerSettings;
pub use error::{Error, Result};
pub use player::Player;
pub use stream::StreamId;
