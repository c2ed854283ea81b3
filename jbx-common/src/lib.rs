//! # JBX Common Library
//!
//! Shared code for the JBX playback core:
//! - Outward event types (PlayerEvent enum)
//! - Fade curve definitions and calculations
//! - Timestamp and human-readable time utilities
//! - Logging initialization
//! - Settings-directory resolution

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod human_time;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
