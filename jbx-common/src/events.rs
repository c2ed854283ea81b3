//! Event types for the JBX notification system
//!
//! Outward-facing notifications emitted by the player for the application
//! shell (display refresh, end-of-queue handling). These are distinct from
//! the internal rendering-thread signals, which never leave the player.

use serde::{Deserialize, Serialize};

/// Player notifications broadcast to the application shell
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// The track on air changed (new queue position, possibly after a
    /// failed stream creation — the position advances either way)
    TrackChanged {
        queue_position: usize,
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Playback stopped because the queue ran dry and the auto controller
    /// declined to extend it
    StoppedByEndOfQueue {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The current stream was classified as video content
    VideoDetected {
        url: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The preview stream reached its natural end and was torn down
    PreviewFinished {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Main volume changed (0..=255 scale)
    VolumeChanged {
        volume: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}
