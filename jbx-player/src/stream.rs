//! Audio stream handle
//!
//! Ties a backend stream to its processing state. The backend delivers
//! messages through the callback built here; the player holds the
//! [`AudioStream`] and destroys it by dropping it, which makes the backend
//! deliver the final `DestroyUserdata` and triggers the library flush.

use crate::backend::{BackendStream, StreamCallback, StreamMessage, StreamTime};
use crate::dsp::{StreamDsp, StreamRoute};
use crate::library::{MediaLibrary, PlaybackReport};
use crate::signals::StreamSignal;
use jbx_common::events::PlayerEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Unique stream identity, stable across the stream's whole life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// One playing (or fading-out) stream.
pub struct AudioStream {
    id: StreamId,
    url: String,
    dsp: Arc<StreamDsp>,
    backend: Box<dyn BackendStream>,
}

impl AudioStream {
    pub fn new(
        id: StreamId,
        url: String,
        dsp: Arc<StreamDsp>,
        backend: Box<dyn BackendStream>,
    ) -> Self {
        Self { id, url, dsp, backend }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn dsp(&self) -> &Arc<StreamDsp> {
        &self.dsp
    }

    /// Current timing; a known total is remembered for the final flush.
    pub fn time(&self) -> StreamTime {
        let t = self.backend.time();
        if let Some(total) = t.total_ms {
            self.dsp.note_decoded_ms(total);
        }
        t
    }

    pub fn seek_abs(&mut self, ms: u64) {
        self.backend.seek_abs(ms);
    }
}

/// Build the callback the backend invokes for one stream.
///
/// Runs on backend threads: `Created` and `DestroyUserdata` may touch the
/// library, everything else stays on the lock-light processing path.
pub fn stream_callback(
    dsp: Arc<StreamDsp>,
    library: Arc<dyn MediaLibrary>,
    events: broadcast::Sender<PlayerEvent>,
    url: String,
    use_album_gain: bool,
) -> StreamCallback {
    let started_at = jbx_common::time::now();
    Arc::new(move |message: StreamMessage<'_>| match message {
        StreamMessage::Created => {
            let gain = library.precalculated_gain(&url, use_album_gain);
            dsp.set_precalculated_gain(gain);
            debug!(stream = %dsp.id(), url = %url, ?gain, "stream created");
        }
        StreamMessage::Buffer {
            samples,
            sample_rate,
            channels,
        } => {
            dsp.process_buffer(samples, sample_rate, channels);
        }
        StreamMessage::VideoDetected => {
            if dsp.mark_video() {
                debug!(stream = %dsp.id(), url = %url, "video content detected");
                let _ = events.send(PlayerEvent::VideoDetected {
                    url: url.clone(),
                    timestamp: jbx_common::time::now(),
                });
            }
        }
        StreamMessage::EndOfStream => {
            let signal = match dsp.route() {
                StreamRoute::Main => StreamSignal::PrimaryEndOfStream(dsp.id()),
                StreamRoute::Prelisten => StreamSignal::PreviewEndOfStream(dsp.id()),
            };
            dsp.post_signal(signal);
        }
        StreamMessage::DestroyUserdata => {
            // Final message for this stream; prelisten playbacks are not
            // reported, they must not bump play counts.
            if dsp.route() == StreamRoute::Main {
                library.playback_finished(PlaybackReport {
                    url: url.clone(),
                    started_at,
                    measured_gain: dsp.measured_gain_if_worth_saving(),
                    decoded_ms: dsp.decoded_ms(),
                });
            }
            debug!(stream = %dsp.id(), url = %url, "stream destroyed");
        }
    })
}
