//! Media library and auto-enqueue seams
//!
//! The player consults the library for precalculated gains and reports
//! finished playbacks back to it. [`MediaLibrary`] is invoked from stream
//! callbacks as well as the control thread, so it must be `Sync`;
//! implementations are expected to keep these calls cheap.

use crate::queue::PlaybackQueue;
use chrono::{DateTime, Utc};

/// What a finished playback leaves behind.
#[derive(Debug, Clone)]
pub struct PlaybackReport {
    pub url: String,
    pub started_at: DateTime<Utc>,
    /// Measured normalization gain, when the estimate was solid
    pub measured_gain: Option<f32>,
    /// Duration as last reported by the backend, 0 if never known
    pub decoded_ms: u64,
}

/// Track metadata store.
pub trait MediaLibrary: Send + Sync {
    /// Normalization gain from an earlier playback, track or album scope.
    fn precalculated_gain(&self, url: &str, use_album_gain: bool) -> Option<f32>;

    /// Persist play count, last-played time and the measured gain.
    fn playback_finished(&self, report: PlaybackReport);
}

/// Library that knows nothing and stores nothing.
pub struct NullLibrary;

impl MediaLibrary for NullLibrary {
    fn precalculated_gain(&self, _url: &str, _use_album_gain: bool) -> Option<f32> {
        None
    }

    fn playback_finished(&self, _report: PlaybackReport) {}
}

/// Extends the queue when it runs dry.
///
/// Consulted before declaring end-of-queue, both from the crossfade tick
/// and from the end-of-stream handler. `ignore_timeouts` bypasses any
/// rate limiting the controller applies between automatic additions.
pub trait AutoController: Send {
    /// Returns true when at least one entry was appended.
    fn try_auto_enqueue(&mut self, queue: &mut dyn PlaybackQueue, ignore_timeouts: bool) -> bool;
}

/// Controller that never extends the queue.
pub struct NoAutoControl;

impl AutoController for NoAutoControl {
    fn try_auto_enqueue(&mut self, _queue: &mut dyn PlaybackQueue, _ignore_timeouts: bool) -> bool {
        false
    }
}
