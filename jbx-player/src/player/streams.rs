//! Stream lifecycle
//!
//! Creation wires up the per-stream processing state and callback;
//! deletion either drops the stream immediately (the backend delivers
//! `DestroyUserdata` during the drop) or starts a fade-out and parks the
//! stream in the trash until its auto-delete signal arrives.

use super::Player;
use crate::config::PrelistenDest;
use crate::dsp::{StreamDsp, StreamRoute};
use crate::error::Result;
use crate::stream::{stream_callback, AudioStream, StreamId};
use jbx_common::FadeCurve;
use std::sync::Arc;
use tracing::debug;

impl Player {
    /// Create a stream on the route's backend.
    ///
    /// `fade_in_ms > 0` starts the stream silent and rising; the ramp is
    /// positioned once the first buffer renders.
    pub(crate) fn create_stream(
        &mut self,
        url: &str,
        start_offset_ms: u64,
        fade_in_ms: u64,
        route: StreamRoute,
    ) -> Result<AudioStream> {
        let id = StreamId::new();
        let dsp = Arc::new(StreamDsp::new(
            id,
            route,
            Arc::clone(&self.shared),
            self.signals_tx.clone(),
        ));
        if fade_in_ms > 0 {
            dsp.fade.set_gain(0.0);
            dsp.fade.slide_to(1.0, fade_in_ms, FadeCurve::default());
        }

        let callback = stream_callback(
            Arc::clone(&dsp),
            Arc::clone(&self.library),
            self.events.clone(),
            url.to_string(),
            self.settings.av_use_album_gain,
        );

        let use_prelisten_device = route == StreamRoute::Prelisten
            && self.settings.prelisten_dest == PrelistenDest::OwnOutput
            && self.prelisten_backend.is_some();
        let backend = if use_prelisten_device {
            self.prelisten_backend.as_mut().map(|b| b.as_mut()).unwrap_or(self.backend.as_mut())
        } else {
            self.backend.as_mut()
        };

        let was_closed = !backend.is_device_open();
        let handle = backend.create_stream(url, start_offset_ms, callback)?;
        if was_closed {
            debug!(backend = backend.name(), "output device opened");
        }

        Ok(AudioStream::new(id, url.to_string(), dsp, handle))
    }

    /// Destroy a stream, optionally fading it out first.
    pub(crate) fn delete_stream(&mut self, stream: AudioStream, fade_out_ms: u64) {
        stream.dsp().set_on_air(false);
        if fade_out_ms > 0 && !self.signals_tx.is_shutting_down() {
            debug!(stream = %stream.id(), fade_out_ms, "stream moved to trash, fading out");
            stream
                .dsp()
                .begin_fade_out(fade_out_ms, FadeCurve::default());
            self.trash.insert(stream.id(), stream);
        } else {
            debug!(stream = %stream.id(), "stream destroyed");
            drop(stream);
        }
    }

    /// Number of streams waiting in the trash.
    pub fn trashed_stream_count(&self) -> usize {
        self.trash.len()
    }
}
