//! Scriptable in-process backend
//!
//! Drives the player deterministically in tests: stream timing, buffer
//! delivery, end-of-stream and creation failures are all under test
//! control. Honors the real message-ordering contract, including exactly
//! one `DestroyUserdata` per stream on drop.

use crate::backend::{Backend, BackendStream, DeviceState, StreamCallback, StreamMessage, StreamTime};
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Test-side remote control for one fake stream.
pub struct FakeStreamCtl {
    url: String,
    callback: StreamCallback,
    time: Mutex<StreamTime>,
    last_seek: Mutex<Option<u64>>,
    created_sent: AtomicBool,
    destroyed: AtomicBool,
}

impl FakeStreamCtl {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    pub fn last_seek(&self) -> Option<u64> {
        *self.last_seek.lock().unwrap()
    }

    /// Set the timing the stream reports.
    pub fn set_time(&self, total_ms: Option<u64>, elapsed_ms: Option<u64>) {
        *self.time.lock().unwrap() = StreamTime { total_ms, elapsed_ms };
    }

    /// Deliver `Created`, for streams configured to create asynchronously.
    pub fn send_created(&self) {
        if !self.is_destroyed() && !self.created_sent.swap(true, Ordering::AcqRel) {
            (self.callback)(StreamMessage::Created);
        }
    }

    /// Render a buffer of constant samples through the callback and
    /// return it as processed by the pipeline.
    pub fn push_buffer(&self, frames: usize, sample_rate: u32, channels: u16) -> Vec<f32> {
        let mut samples = vec![0.5f32; frames * channels as usize];
        if !self.is_destroyed() {
            (self.callback)(StreamMessage::Buffer {
                samples: &mut samples,
                sample_rate,
                channels,
            });
        }
        samples
    }

    pub fn send_video_detected(&self) {
        if !self.is_destroyed() {
            (self.callback)(StreamMessage::VideoDetected);
        }
    }

    pub fn send_eos(&self) {
        if !self.is_destroyed() {
            (self.callback)(StreamMessage::EndOfStream);
        }
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            (self.callback)(StreamMessage::DestroyUserdata);
        }
    }
}

struct FakeStream {
    ctl: Arc<FakeStreamCtl>,
}

impl BackendStream for FakeStream {
    fn time(&self) -> StreamTime {
        *self.ctl.time.lock().unwrap()
    }

    fn seek_abs(&mut self, ms: u64) {
        *self.ctl.last_seek.lock().unwrap() = Some(ms);
        let mut time = self.ctl.time.lock().unwrap();
        time.elapsed_ms = Some(ms);
    }

    fn url(&self) -> &str {
        &self.ctl.url
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.ctl.destroy();
    }
}

struct FakeShared {
    streams: Vec<Arc<FakeStreamCtl>>,
    fail_creation: HashSet<String>,
    async_creation: HashSet<String>,
    state: DeviceState,
    gain: f32,
    initial_time: Option<StreamTime>,
}

impl Default for FakeShared {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            fail_creation: HashSet::new(),
            async_creation: HashSet::new(),
            state: DeviceState::Closed,
            gain: 1.0,
            initial_time: None,
        }
    }
}

/// Test-side view of a [`FakeBackend`], valid after the backend moved
/// into the player.
#[derive(Clone)]
pub struct FakeBackendHandle {
    shared: Arc<Mutex<FakeShared>>,
}

impl FakeBackendHandle {
    /// Streams in creation order, including destroyed ones.
    pub fn streams(&self) -> Vec<Arc<FakeStreamCtl>> {
        self.shared.lock().unwrap().streams.clone()
    }

    pub fn last_stream(&self) -> Option<Arc<FakeStreamCtl>> {
        self.shared.lock().unwrap().streams.last().cloned()
    }

    pub fn stream_count(&self) -> usize {
        self.shared.lock().unwrap().streams.len()
    }

    pub fn device_state(&self) -> DeviceState {
        self.shared.lock().unwrap().state
    }

    pub fn device_gain(&self) -> f32 {
        self.shared.lock().unwrap().gain
    }

    /// Make creation for `url` fail immediately with an error.
    pub fn fail_creation_of(&self, url: &str) {
        self.shared.lock().unwrap().fail_creation.insert(url.to_string());
    }

    /// Make creation for `url` asynchronous: the handle is returned but
    /// `Created` waits until the test sends it (or never arrives).
    pub fn defer_creation_of(&self, url: &str) {
        self.shared.lock().unwrap().async_creation.insert(url.to_string());
    }

    /// Timing every new stream starts with.
    pub fn set_initial_time(&self, total_ms: Option<u64>, elapsed_ms: Option<u64>) {
        self.shared.lock().unwrap().initial_time = Some(StreamTime { total_ms, elapsed_ms });
    }
}

/// Backend whose streams are driven by the test instead of a device.
pub struct FakeBackend {
    name: String,
    manages_volume: bool,
    shared: Arc<Mutex<FakeShared>>,
}

impl FakeBackend {
    pub fn new(name: &str) -> (Self, FakeBackendHandle) {
        let shared = Arc::new(Mutex::new(FakeShared::default()));
        let handle = FakeBackendHandle {
            shared: Arc::clone(&shared),
        };
        (
            Self {
                name: name.to_string(),
                manages_volume: false,
                shared,
            },
            handle,
        )
    }

    pub fn with_managed_volume(mut self) -> Self {
        self.manages_volume = true;
        self
    }
}

impl Backend for FakeBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_stream(
        &mut self,
        url: &str,
        start_offset_ms: u64,
        callback: StreamCallback,
    ) -> Result<Box<dyn BackendStream>> {
        let mut shared = self.shared.lock().unwrap();
        if shared.fail_creation.contains(url) {
            return Err(Error::StreamCreate {
                url: url.to_string(),
                reason: "fake backend configured to fail".to_string(),
            });
        }

        let mut time = shared.initial_time.unwrap_or_default();
        if time.elapsed_ms.is_none() {
            time.elapsed_ms = Some(start_offset_ms);
        }

        let ctl = Arc::new(FakeStreamCtl {
            url: url.to_string(),
            callback,
            time: Mutex::new(time),
            last_seek: Mutex::new(None),
            created_sent: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        });
        shared.streams.push(Arc::clone(&ctl));

        // Creating the first stream opens the device.
        if shared.state == DeviceState::Closed {
            shared.state = DeviceState::Playing;
        }

        let deliver_created = !shared.async_creation.contains(url);
        drop(shared);

        if deliver_created {
            ctl.send_created();
        }
        debug!(backend = %self.name, url, "fake stream created");
        Ok(Box::new(FakeStream { ctl }))
    }

    fn device_state(&self) -> DeviceState {
        self.shared.lock().unwrap().state
    }

    fn set_device_state(&mut self, state: DeviceState) {
        self.shared.lock().unwrap().state = state;
    }

    fn set_device_gain(&mut self, gain: f32) {
        self.shared.lock().unwrap().gain = gain;
    }

    fn manages_volume(&self) -> bool {
        self.manages_volume
    }
}
