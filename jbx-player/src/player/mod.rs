//! Player orchestration
//!
//! The player runs on a single control thread. It owns the backends, the
//! queue, the live streams and the trash of fading-out streams; rendering
//! threads talk back only through the signal channel. Submodules split the
//! responsibilities: transport controls, stream lifecycle, the once-a-second
//! crossfade tick, signal handling and resume persistence.

mod control;
mod resume;
mod signals;
mod streams;
mod tick;

pub use resume::{ResumeEntry, ResumeSnapshot};

use crate::backend::Backend;
use crate::config::PlayerSettings;
use crate::dsp::DspShared;
use crate::library::{AutoController, MediaLibrary};
use crate::queue::PlaybackQueue;
use crate::signals::{signal_channel, SignalSender, StreamSignal};
use crate::stream::{AudioStream, StreamId};
use jbx_common::events::PlayerEvent;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

/// Capacity of the outward event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

pub struct Player {
    pub(crate) settings: PlayerSettings,
    pub(crate) queue: Box<dyn PlaybackQueue>,
    pub(crate) auto_control: Box<dyn AutoController>,
    pub(crate) library: Arc<dyn MediaLibrary>,

    pub(crate) backend: Box<dyn Backend>,
    pub(crate) prelisten_backend: Option<Box<dyn Backend>>,

    pub(crate) shared: Arc<DspShared>,
    pub(crate) signals_tx: SignalSender,
    signals_rx: Option<mpsc::UnboundedReceiver<StreamSignal>>,
    pub(crate) events: broadcast::Sender<PlayerEvent>,

    /// Stream on air
    pub(crate) primary: Option<AudioStream>,
    /// Prelisten stream, at most one
    pub(crate) preview: Option<AudioStream>,
    /// Fading-out streams awaiting their auto-delete signal
    pub(crate) trash: HashMap<StreamId, AudioStream>,

    pub(crate) paused: bool,
    /// Reentrancy guard for position jumps triggered from event handlers
    pub(crate) in_goto: bool,

    /// Current main volume, 0..=255
    pub(crate) volume: u8,
    /// Volume before muting; `Some` means muted
    pub(crate) mute_backup: Option<u8>,

    pub(crate) stop_after_this_track: bool,
    /// URLs whose stream creation failed this session; skipped until the
    /// next stop
    pub(crate) failed_urls: HashSet<String>,
}

impl Player {
    pub fn new(
        backend: Box<dyn Backend>,
        queue: Box<dyn PlaybackQueue>,
        library: Arc<dyn MediaLibrary>,
        auto_control: Box<dyn AutoController>,
        settings: PlayerSettings,
    ) -> Self {
        let shared = Arc::new(DspShared::default());
        let (signals_tx, signals_rx) = signal_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let mut player = Self {
            volume: settings.volume,
            settings,
            queue,
            auto_control,
            library,
            backend,
            prelisten_backend: None,
            shared,
            signals_tx,
            signals_rx: Some(signals_rx),
            events,
            primary: None,
            preview: None,
            trash: HashMap::new(),
            paused: false,
            in_goto: false,
            mute_backup: None,
            stop_after_this_track: false,
            failed_urls: HashSet::new(),
        };
        player.apply_settings_to_shared();
        player
    }

    /// Attach a dedicated prelisten output device.
    pub fn with_prelisten_backend(mut self, backend: Box<dyn Backend>) -> Self {
        self.prelisten_backend = Some(backend);
        self
    }

    /// Push every settings-derived knob into the shared processing state.
    pub(crate) fn apply_settings_to_shared(&mut self) {
        let s = &self.settings;
        self.shared.set_av_enabled(s.av_enabled);
        self.shared.set_av_desired_volume(s.av_desired_volume);
        self.shared.set_av_max_gain(s.av_max_gain);
        self.shared.set_eq_enabled(s.eq_enabled);
        self.shared.set_eq_band_gains(&s.eq_band_gains_db);
        self.shared.set_prelisten_dest(s.prelisten_dest);
        self.shared.set_prelisten_gain(s.prelisten_gain);
        self.shared
            .set_main_device_manages_volume(self.backend.manages_volume());
        self.apply_volume_internal(self.volume);
    }

    /// Take the receiving half of the signal channel, once; the caller's
    /// control loop pumps it into [`Player::receive_signal`].
    pub fn take_signal_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<StreamSignal>> {
        self.signals_rx.take()
    }

    /// Subscribe to outward player events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &PlayerSettings {
        &self.settings
    }

    /// Persist the settings, with the pre-mute volume rather than 0.
    pub fn save_settings(&self, path: &std::path::Path) -> crate::error::Result<()> {
        let mut settings = self.settings.clone();
        settings.volume = self.persistent_volume();
        settings.save(path)
    }

    /// Shared processing state, for displays (vis tap, calculated gain).
    pub fn dsp_shared(&self) -> &Arc<DspShared> {
        &self.shared
    }

    /// Stop everything and flip the signal channel into drop mode.
    ///
    /// After this, late signals from rendering threads cannot reach player
    /// state anymore; stream teardown still flushes gathered info to the
    /// library synchronously.
    pub fn shutdown(&mut self) {
        info!("player shutting down");
        self.signals_tx.begin_shutdown();
        self.stop();
    }
}
