//! Crossfade scheduling
//!
//! Driven once a second by the control loop. When the stream on air gets
//! within lead time of its end, the next track starts early and the old
//! one fades into the trash, so both overlap for the crossfade duration.

use super::Player;
use crate::dsp::StreamRoute;
use tracing::{debug, info, warn};

impl Player {
    /// Evaluate the crossfade condition for the stream on air.
    ///
    /// Crossfading is skipped entirely for video content, while timing is
    /// still unknown, and for tracks shorter than twice the crossfade. A
    /// next URL that failed earlier is left for the end-of-stream handler.
    pub fn one_second_tick(&mut self) {
        if self.paused || !self.settings.auto_crossfade {
            return;
        }
        let Some(primary) = &self.primary else {
            return;
        };
        if primary.dsp().is_video() {
            return;
        }

        let time = primary.time();
        let (Some(total_ms), Some(elapsed_ms)) = (time.total_ms, time.elapsed_ms) else {
            return;
        };

        let crossfade_ms = self.settings.auto_crossfade_ms;
        if crossfade_ms == 0 || total_ms < crossfade_ms * 2 {
            return;
        }

        let lead_ms = crossfade_ms
            + self.settings.crossfade_offset_end_ms
            + self.settings.create_headroom_ms;
        if elapsed_ms + lead_ms < total_ms {
            return;
        }

        // Resolve the next track, extending the queue if a controller can.
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
            // Queue exhausted; the natural end-of-stream will stop us.
            return;
        };
        let Some(url) = self.queue.url_at(next) else {
            return;
        };
        if self.failed_urls.contains(&url) {
            debug!(url = %url, "next track failed earlier, skipping crossfade");
            return;
        }

        info!(
            position = %format_args!(
                "{} / {}",
                jbx_common::human_time::format_ms(elapsed_ms),
                jbx_common::human_time::format_ms(total_ms)
            ),
            crossfade_ms,
            next,
            url = %url,
            "starting crossfade"
        );

        let fade_in_ms = if self.settings.only_fade_out {
            0
        } else {
            crossfade_ms
        };

        let old = match self.primary.take() {
            Some(stream) => stream,
            None => return,
        };
        self.delete_stream(old, crossfade_ms);

        self.queue.set_current_position(next);
        match self.create_stream(&url, 0, fade_in_ms, StreamRoute::Main) {
            Ok(stream) => {
                stream.dsp().set_on_air(true);
                self.primary = Some(stream);
                self.queue.mark_played(next, true);
                self.emit_track_changed(next, url);
            }
            Err(e) => {
                warn!(url = %url, error = %e, "stream creation failed during crossfade");
                self.failed_urls.insert(url.clone());
                self.emit_track_changed(next, url);
                // Try whatever comes after, as the end-of-stream path would.
                self.advance_after_end();
            }
        }
    }
}
