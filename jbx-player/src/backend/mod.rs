//! Playback backend contract
//!
//! A backend owns one output device and the streams rendering into it.
//! Decoding runs on backend-internal threads; processed audio is handed to
//! the stream callback from the rendering thread, so everything reachable
//! from the callback must be wait-free or nearly so.
//!
//! Message ordering per stream is guaranteed:
//! `Created` (unless creation fails outright) → zero or more `Buffer` →
//! optional `EndOfStream` → exactly one `DestroyUserdata` when the stream
//! handle is dropped. `DestroyUserdata` is the last message; the callback
//! is never invoked for that stream again.

pub mod device;
pub mod fake;

use crate::error::Result;
use std::sync::Arc;

/// Output device lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Device closed, no streams exist
    Closed,
    /// Device open and rendering
    Playing,
    /// Device open but rendering suspended
    Paused,
}

/// Timing snapshot for one stream.
///
/// Either field may be unknown: total duration until enough of the media
/// has been probed, elapsed before the first buffer renders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamTime {
    pub total_ms: Option<u64>,
    pub elapsed_ms: Option<u64>,
}

impl StreamTime {
    /// Remaining milliseconds, when both endpoints are known.
    pub fn remaining_ms(&self) -> Option<u64> {
        match (self.total_ms, self.elapsed_ms) {
            (Some(total), Some(elapsed)) => Some(total.saturating_sub(elapsed)),
            _ => None,
        }
    }
}

/// Messages delivered to a stream callback.
///
/// `Buffer` carries samples in place; the callback modifies them before the
/// backend forwards them to the device.
pub enum StreamMessage<'a> {
    /// Stream opened successfully; delivered before the first `Buffer`
    Created,
    /// Interleaved f32 samples to process in place
    Buffer {
        samples: &'a mut [f32],
        sample_rate: u32,
        channels: u16,
    },
    /// The media turned out to carry a video track
    VideoDetected,
    /// Decoding reached the natural end of the media
    EndOfStream,
    /// Final message: the stream handle was dropped, flush per-stream state now
    DestroyUserdata,
}

/// Stream callback invoked by the backend.
///
/// Shared between the control thread (which builds it) and the backend's
/// rendering thread, hence `Send + Sync`.
pub type StreamCallback = Arc<dyn Fn(StreamMessage<'_>) + Send + Sync>;

/// Handle to one stream within a backend.
///
/// Dropping the handle destroys the stream; the backend delivers
/// `DestroyUserdata` exactly once during or shortly after the drop.
pub trait BackendStream: Send {
    /// Current timing, `None` fields while still unknown
    fn time(&self) -> StreamTime;

    /// Jump to an absolute position in milliseconds
    fn seek_abs(&mut self, ms: u64);

    /// Source URL this stream was created for
    fn url(&self) -> &str;
}

/// One output device plus its streams.
pub trait Backend: Send {
    /// Backend identity for logs ("audioout", "prelisten")
    fn name(&self) -> &str;

    /// Open a stream for `url`, starting `start_offset_ms` into the media.
    ///
    /// Creation may complete asynchronously: a returned handle can still
    /// fail later, reported as `EndOfStream` without a preceding `Created`.
    /// Immediate failures return `Err` and deliver no messages at all.
    fn create_stream(
        &mut self,
        url: &str,
        start_offset_ms: u64,
        callback: StreamCallback,
    ) -> Result<Box<dyn BackendStream>>;

    /// Current device state
    fn device_state(&self) -> DeviceState;

    /// Request a device state change; `Closed` tears the device down
    fn set_device_state(&mut self, state: DeviceState);

    /// Hardware/system volume, only meaningful when `manages_volume()`
    fn set_device_gain(&mut self, gain: f32);

    /// True when the device applies volume itself, so the processing
    /// pipeline must not scale samples a second time
    fn manages_volume(&self) -> bool {
        false
    }

    fn is_device_open(&self) -> bool {
        self.device_state() != DeviceState::Closed
    }
}
