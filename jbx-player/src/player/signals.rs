//! Signal handling
//!
//! The control loop pumps signals drained from the channel into
//! [`Player::receive_signal`]. Signals from streams that are no longer the
//! primary (trashed during a crossfade, or already replaced) are stale and
//! dropped by identity check.

use super::Player;
use crate::dsp::StreamRoute;
use crate::signals::StreamSignal;
use crate::stream::StreamId;
use jbx_common::events::PlayerEvent;
use tracing::{debug, info, warn};

impl Player {
    /// React to one signal from a rendering thread.
    pub fn receive_signal(&mut self, signal: StreamSignal) {
        match signal {
            StreamSignal::PrimaryEndOfStream(id) => self.handle_primary_end(id),
            StreamSignal::PreviewEndOfStream(id) => self.handle_preview_end(id),
            StreamSignal::AutoDelete(id) => self.handle_auto_delete(id),
        }
    }

    fn handle_primary_end(&mut self, id: StreamId) {
        let is_current = self.primary.as_ref().map(|s| s.id()) == Some(id);
        if !is_current {
            debug!(stream = %id, "ignoring end-of-stream from stale stream");
            return;
        }

        if self.stop_after_this_track || self.settings.stop_after_each_track {
            info!("stop-after flag set, stopping at track end");
            // Park the position where playback would continue.
            if let Some(next) = self.queue.next_position(false) {
                self.queue.set_current_position(next);
            }
            self.stop();
            return;
        }

        if let Some(finished) = self.primary.take() {
            self.delete_stream(finished, 0);
        }
        self.advance_after_end();
    }

    /// Move on to the next playable track, or stop at the end of the queue.
    ///
    /// Failed URLs are skipped; a creation failure marks the URL as failed
    /// and the advance continues. The attempt count is bounded by the queue
    /// length so a fully broken queue under repeat cannot spin forever.
    pub(crate) fn advance_after_end(&mut self) {
        let mut attempts = 0usize;
        loop {
            attempts += 1;
            if attempts > self.queue.len() + 1 {
                warn!("no playable track left in the queue");
                self.stop_at_end_of_queue();
                return;
            }

            let next = match self.queue.next_position(true) {
                Some(pos) => Some(pos),
                None => {
                    if self.auto_control.try_auto_enqueue(self.queue.as_mut(), false) {
                        self.queue.next_position(true)
                    } else {
                        None
                    }
                }
            };
            let Some(next) = next else {
                self.stop_at_end_of_queue();
                return;
            };
            let Some(url) = self.queue.url_at(next) else {
                self.stop_at_end_of_queue();
                return;
            };

            self.queue.set_current_position(next);
            if self.failed_urls.contains(&url) {
                debug!(url = %url, "skipping previously failed track");
                continue;
            }

            match self.create_stream(&url, 0, 0, StreamRoute::Main) {
                Ok(stream) => {
                    stream.dsp().set_on_air(true);
                    self.primary = Some(stream);
                    self.queue.mark_played(next, true);
                    info!(pos = next, url = %url, "advanced to next track");
                    self.emit_track_changed(next, url);
                    return;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "stream creation failed, skipping track");
                    self.failed_urls.insert(url.clone());
                    self.emit_track_changed(next, url);
                }
            }
        }
    }

    fn stop_at_end_of_queue(&mut self) {
        self.stop();
        let _ = self.events.send(PlayerEvent::StoppedByEndOfQueue {
            timestamp: jbx_common::time::now(),
        });
    }

    fn handle_preview_end(&mut self, id: StreamId) {
        let is_current = self.preview.as_ref().map(|s| s.id()) == Some(id);
        if !is_current {
            debug!(stream = %id, "ignoring end-of-stream from stale preview");
            return;
        }
        if let Some(preview) = self.preview.take() {
            drop(preview);
        }
        self.close_idle_prelisten_device();
        info!("preview finished");
        let _ = self.events.send(PlayerEvent::PreviewFinished {
            timestamp: jbx_common::time::now(),
        });
    }

    fn handle_auto_delete(&mut self, id: StreamId) {
        if let Some(stream) = self.trash.remove(&id) {
            debug!(stream = %id, "faded-out stream deleted from trash");
            drop(stream);
        }
    }
}
