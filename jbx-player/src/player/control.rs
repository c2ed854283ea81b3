//! Transport and volume controls
//!
//! All methods run on the control thread and return quickly; the heavy
//! lifting (decoding, fading) happens on backend threads.

use super::Player;
use crate::backend::{DeviceState, StreamTime};
use crate::config::{PlayerSettings, PrelistenDest, DEFAULT_VOLUME};
use crate::dsp::equalizer::EQ_BANDS;
use crate::dsp::StreamRoute;
use crate::error::Result;
use jbx_common::events::PlayerEvent;
use tracing::{info, warn};

impl Player {
    pub fn is_playing(&self) -> bool {
        self.primary.is_some() && !self.paused
    }

    pub fn is_paused(&self) -> bool {
        self.primary.is_some() && self.paused
    }

    pub fn is_stopped(&self) -> bool {
        self.primary.is_none()
    }

    /// Start playback of the current queue position, optionally seeking.
    ///
    /// Resumes when paused. With an empty queue this is a no-op and the
    /// player stays stopped.
    pub fn play(&mut self, seek_ms: u64) -> Result<()> {
        if self.primary.is_some() {
            if self.paused {
                self.paused = false;
                self.backend.set_device_state(DeviceState::Playing);
            }
            if seek_ms > 0 {
                self.seek_abs(seek_ms);
            }
            return Ok(());
        }

        let pos = match self.queue.current_position() {
            Some(pos) => pos,
            None => match self.queue.next_position(true) {
                Some(pos) => pos,
                None => return Ok(()),
            },
        };
        let Some(url) = self.queue.url_at(pos) else {
            return Ok(());
        };

        // A mid-track start gets a short rise instead of a hard cut-in.
        let fade_in_ms = if seek_ms > 0 { self.settings.goto_fade_ms } else { 0 };
        let stream = self.create_stream(&url, seek_ms, fade_in_ms, StreamRoute::Main)?;
        stream.dsp().set_on_air(true);
        self.primary = Some(stream);
        self.paused = false;
        self.backend.set_device_state(DeviceState::Playing);
        self.push_volume_to_device();

        self.queue.set_current_position(pos);
        self.queue.mark_played(pos, true);
        info!(pos, url = %url, seek_ms, "playback started");
        self.emit_track_changed(pos, url);
        Ok(())
    }

    /// Suspend rendering; streams and their positions stay intact.
    pub fn pause(&mut self) {
        if self.primary.is_some() && !self.paused && self.backend.is_device_open() {
            self.backend.set_device_state(DeviceState::Paused);
            self.paused = true;
            info!("playback paused");
        }
    }

    /// Destroy all streams and close the devices.
    ///
    /// Also forgets the failed-URL set and any pending stop-after flag, so
    /// the next session starts clean.
    pub fn stop(&mut self) {
        self.stop_after_this_track = false;
        self.failed_urls.clear();
        self.paused = false;

        if let Some(primary) = self.primary.take() {
            self.delete_stream(primary, 0);
        }
        if let Some(preview) = self.preview.take() {
            drop(preview);
        }
        // Dropping trashed streams delivers their DestroyUserdata too.
        self.trash.clear();

        self.backend.set_device_state(DeviceState::Closed);
        if let Some(prelisten) = &mut self.prelisten_backend {
            prelisten.set_device_state(DeviceState::Closed);
        }
        info!("playback stopped");
    }

    /// Jump to an absolute queue position.
    ///
    /// While playing, the old stream fades out over the manual crossfade
    /// duration (if `fade`) and the new one starts; while paused, playback
    /// stops at the new position; while stopped, only the position moves.
    /// The position advances and the change is announced even when the new
    /// stream cannot be created.
    pub fn goto_abs_pos(&mut self, pos: usize, fade: bool) -> Result<()> {
        if self.in_goto {
            return Ok(());
        }
        self.in_goto = true;
        let result = self.goto_abs_pos_locked(pos, fade);
        self.in_goto = false;
        result
    }

    fn goto_abs_pos_locked(&mut self, pos: usize, fade: bool) -> Result<()> {
        let Some(url) = self.queue.url_at(pos) else {
            return Err(crate::error::Error::Queue(format!(
                "queue position {} out of range",
                pos
            )));
        };
        self.stop_after_this_track = false;
        self.queue.set_current_position(pos);

        if self.is_paused() {
            // A paused device never renders, so trashed streams would sit
            // in their fade forever; a full stop reclaims them all.
            self.stop();
            self.queue.set_current_position(pos);
            self.emit_track_changed(pos, url);
            return Ok(());
        }

        if self.is_stopped() {
            self.emit_track_changed(pos, url);
            return Ok(());
        }

        let fade_out_ms = if fade { self.settings.man_crossfade_ms } else { 0 };
        let fade_in_ms = if fade && !self.settings.only_fade_out {
            fade_out_ms
        } else {
            0
        };

        if let Some(old) = self.primary.take() {
            self.delete_stream(old, fade_out_ms);
        }
        match self.create_stream(&url, 0, fade_in_ms, StreamRoute::Main) {
            Ok(stream) => {
                stream.dsp().set_on_air(true);
                self.primary = Some(stream);
                self.queue.mark_played(pos, true);
                info!(pos, url = %url, fade, "jumped to queue position");
            }
            Err(e) => {
                warn!(pos, url = %url, error = %e, "stream creation failed on jump");
                self.failed_urls.insert(url.clone());
            }
        }
        self.emit_track_changed(pos, url);
        Ok(())
    }

    /// Timing of the stream on air; empty while stopped.
    pub fn time(&self) -> StreamTime {
        self.primary.as_ref().map(|s| s.time()).unwrap_or_default()
    }

    /// Seek within the stream on air.
    pub fn seek_abs(&mut self, ms: u64) {
        if let Some(primary) = &mut self.primary {
            primary.seek_abs(ms);
        }
    }

    /// URL currently on air.
    pub fn current_url(&self) -> Option<String> {
        self.primary.as_ref().map(|s| s.url().to_string())
    }

    // ---- volume ----

    pub fn main_volume(&self) -> u8 {
        self.volume
    }

    /// Set the main volume (0..=255). Unmutes.
    pub fn set_main_volume(&mut self, volume: u8) {
        self.mute_backup = None;
        self.apply_volume(volume);
    }

    /// Mute by remembering the volume and dropping to zero; unmute
    /// restores the backup, or the default if the backup is uselessly low.
    pub fn set_main_volume_mute(&mut self, mute: bool) {
        if mute {
            if self.mute_backup.is_none() {
                self.mute_backup = Some(self.volume);
                self.apply_volume(0);
            }
        } else if let Some(backup) = self.mute_backup.take() {
            let restore = if backup > 8 { backup } else { DEFAULT_VOLUME };
            self.apply_volume(restore);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.mute_backup.is_some()
    }

    fn apply_volume(&mut self, volume: u8) {
        self.apply_volume_internal(volume);
        let _ = self.events.send(PlayerEvent::VolumeChanged {
            volume,
            timestamp: jbx_common::time::now(),
        });
    }

    pub(crate) fn apply_volume_internal(&mut self, volume: u8) {
        self.volume = volume;
        self.shared
            .set_main_gain(PlayerSettings::volume_to_gain(volume));
        self.push_volume_to_device();
    }

    /// Forward the volume to the device when it manages volume itself.
    pub(crate) fn push_volume_to_device(&mut self) {
        if self.backend.manages_volume() && self.backend.is_device_open() {
            self.backend
                .set_device_gain(PlayerSettings::volume_to_gain(self.volume));
        }
    }

    /// Volume to persist: the audible one, or the pre-mute backup.
    pub fn persistent_volume(&self) -> u8 {
        self.mute_backup.unwrap_or(self.volume)
    }

    // ---- auto-volume / equalizer / prelisten ----

    pub fn set_av_enabled(&mut self, on: bool) {
        self.settings.av_enabled = on;
        self.shared.set_av_enabled(on);
    }

    pub fn set_av_desired_volume(&mut self, v: f32) {
        self.settings.av_desired_volume = v;
        self.shared.set_av_desired_volume(v);
    }

    pub fn set_av_max_gain(&mut self, v: f32) {
        self.settings.av_max_gain = v;
        self.shared.set_av_max_gain(v);
    }

    pub fn set_av_use_album_gain(&mut self, on: bool) {
        self.settings.av_use_album_gain = on;
    }

    /// Gain the pipeline is currently applying to the on-air stream.
    pub fn av_calculated_gain(&self) -> f32 {
        self.shared.av_calculated_gain()
    }

    pub fn set_eq_enabled(&mut self, on: bool) {
        self.settings.eq_enabled = on;
        self.shared.set_eq_enabled(on);
    }

    pub fn set_eq_band_gains(&mut self, gains_db: [f32; EQ_BANDS]) {
        self.settings.eq_band_gains_db = gains_db;
        self.shared.set_eq_band_gains(&gains_db);
    }

    pub fn set_prelisten_dest(&mut self, dest: PrelistenDest) {
        self.settings.prelisten_dest = dest;
        self.shared.set_prelisten_dest(dest);
    }

    pub fn set_prelisten_gain(&mut self, gain: f32) {
        let gain = gain.clamp(0.0, 1.0);
        self.settings.prelisten_gain = gain;
        self.shared.set_prelisten_gain(gain);
    }

    // ---- stop-after ----

    pub fn set_stop_after_this_track(&mut self, on: bool) {
        self.stop_after_this_track = on;
    }

    pub fn stop_after_this_track(&self) -> bool {
        self.stop_after_this_track
    }

    pub fn set_stop_after_each_track(&mut self, on: bool) {
        self.settings.stop_after_each_track = on;
    }

    // ---- prelisten ----

    /// Start prelistening to `url`, or stop it when it is already the one
    /// playing. At most one preview exists at a time.
    pub fn toggle_preview(&mut self, url: &str) -> Result<()> {
        if let Some(preview) = self.preview.take() {
            let same = preview.url() == url;
            drop(preview);
            self.close_idle_prelisten_device();
            if same {
                return Ok(());
            }
        }
        let stream = self.create_stream(url, 0, 0, StreamRoute::Prelisten)?;
        info!(url, "preview started");
        self.preview = Some(stream);
        Ok(())
    }

    pub fn is_previewing(&self) -> bool {
        self.preview.is_some()
    }

    pub(crate) fn close_idle_prelisten_device(&mut self) {
        if self.preview.is_none() {
            if let Some(prelisten) = &mut self.prelisten_backend {
                prelisten.set_device_state(DeviceState::Closed);
            }
        }
    }

    // ---- misc ----

    /// Rough total of what is still to play: remaining time of the track
    /// on air plus the durations of the queue entries after it, assuming
    /// three minutes for entries of unknown length.
    pub fn enqueue_time_ms(&self) -> u64 {
        const UNKNOWN_PLAYTIME_MS: u64 = 180_000;
        let mut total = self.time().remaining_ms().unwrap_or(0);
        let after = self.queue.current_position().map(|p| p + 1).unwrap_or(0);
        for pos in after..self.queue.len() {
            if let Some(entry) = self.queue.entry_at(pos) {
                total += entry.playtime_ms.unwrap_or(UNKNOWN_PLAYTIME_MS);
            }
        }
        total
    }

    pub(crate) fn emit_track_changed(&self, pos: usize, url: String) {
        let _ = self.events.send(PlayerEvent::TrackChanged {
            queue_position: pos,
            url,
            timestamp: jbx_common::time::now(),
        });
    }
}
