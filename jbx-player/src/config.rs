//! Player settings
//!
//! TOML-backed settings with defaults matching long-standing jukebox
//! behavior: main volume on a 0..=255 scale defaulting to 240, automatic
//! crossfades of 10 s triggered 3 s before the track end, auto-volume
//! enabled with a 5x gain ceiling.

use crate::dsp::equalizer::EQ_BANDS;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Default main volume on the 0..=255 scale
pub const DEFAULT_VOLUME: u8 = 240;

/// Where prelisten audio is routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrelistenDest {
    /// Mixed into both channels of the main output
    #[default]
    Mix,
    /// Left channel of the main output only
    Left,
    /// Right channel of the main output only
    Right,
    /// A dedicated second output device
    OwnOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Main volume, 0..=255
    pub volume: u8,

    /// Crossfade into the next track automatically near the end
    pub auto_crossfade: bool,
    /// Duration of automatic crossfades in ms
    pub auto_crossfade_ms: u64,
    /// Duration of fades for manual track changes in ms
    pub man_crossfade_ms: u64,
    /// Start the automatic crossfade this many ms before the track end,
    /// skipping trailing silence and fade-outs baked into the media
    pub crossfade_offset_end_ms: u64,
    /// Extra lead time for stream creation latency in ms
    pub create_headroom_ms: u64,
    /// Fade the old track out without fading the new one in
    pub only_fade_out: bool,
    /// Fade applied when playback starts at a nonzero seek position
    pub goto_fade_ms: u64,

    /// Auto-volume: normalize perceived loudness across tracks
    pub av_enabled: bool,
    /// Auto-volume target, 1.0 = reference level
    pub av_desired_volume: f32,
    /// Auto-volume never amplifies beyond this factor
    pub av_max_gain: f32,
    /// Prefer album gain over track gain when the library has both
    pub av_use_album_gain: bool,

    /// Graphic equalizer on/off
    pub eq_enabled: bool,
    /// Equalizer band gains in dB, 31 Hz .. 16 kHz
    pub eq_band_gains_db: [f32; EQ_BANDS],

    /// Prelisten routing
    pub prelisten_dest: PrelistenDest,
    /// Prelisten gain, 0.0..=1.0
    pub prelisten_gain: f32,

    /// Stop after every track instead of advancing
    pub stop_after_each_track: bool,

    /// Restore already-played queue entries from the resume snapshot
    pub resume_load_played: bool,
    /// Restart playback at the saved position on startup
    pub resume_start_playback: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            auto_crossfade: true,
            auto_crossfade_ms: 10_000,
            man_crossfade_ms: 10_000,
            crossfade_offset_end_ms: 3_000,
            create_headroom_ms: 0,
            only_fade_out: false,
            goto_fade_ms: 1_000,
            av_enabled: true,
            av_desired_volume: 1.0,
            av_max_gain: 5.0,
            av_use_album_gain: false,
            eq_enabled: false,
            eq_band_gains_db: [0.0; EQ_BANDS],
            prelisten_dest: PrelistenDest::Mix,
            prelisten_gain: 1.0,
            stop_after_each_track: false,
            resume_load_played: false,
            resume_start_playback: false,
        }
    }
}

impl PlayerSettings {
    /// Load settings from a TOML file; a missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let settings: PlayerSettings = toml::from_str(&contents)
                    .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
                debug!("Loaded settings from {}", path.display());
                Ok(settings.sanitized())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write settings as TOML, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize settings: {}", e)))?;
        std::fs::write(path, contents)?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Clamp out-of-range values from hand-edited files.
    fn sanitized(mut self) -> Self {
        if self.av_max_gain < 1.0 {
            warn!("av_max_gain {} below 1.0, resetting to 1.0", self.av_max_gain);
            self.av_max_gain = 1.0;
        }
        self.av_desired_volume = self.av_desired_volume.clamp(0.0, 2.0);
        self.prelisten_gain = self.prelisten_gain.clamp(0.0, 1.0);
        self
    }

    /// Gain factor for a 0..=255 volume value.
    pub fn volume_to_gain(volume: u8) -> f32 {
        volume as f32 / 255.0
    }
}
