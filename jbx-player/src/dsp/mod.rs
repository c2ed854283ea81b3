//! Real-time signal processing pipeline
//!
//! Every buffer a backend renders passes through one [`StreamDsp`] in a
//! fixed stage order: gain estimation, auto-volume scaling, equalizer,
//! visualization tap, fade envelope, routing and final volume. Stages read
//! shared player state ([`DspShared`]) through atomics so the control
//! thread can flip switches without stalling audio.

pub mod equalizer;
pub mod volume_calc;
pub mod volume_fade;

use crate::config::PrelistenDest;
use crate::signals::{SignalSender, StreamSignal};
use crate::stream::StreamId;
use crate::vis::VisTap;
use equalizer::{Equalizer, EQ_BANDS};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use volume_calc::VolumeCalc;
use volume_fade::VolumeFade;

/// f32 stored as its bit pattern for lock-free shared reads.
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

/// Which output path a stream renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRoute {
    /// Regular playback on the main device
    Main,
    /// Prelisten, routed per the shared prelisten destination
    Prelisten,
}

/// Player-wide processing state shared with all rendering threads.
///
/// Written by the control thread, read by rendering threads every buffer.
/// All fields are independent knobs, so relaxed ordering is fine.
pub struct DspShared {
    av_enabled: AtomicBool,
    av_desired_volume: AtomicF32,
    av_max_gain: AtomicF32,
    /// Gain last applied to the on-air stream, for display
    av_calculated_gain: AtomicF32,

    eq_enabled: AtomicBool,
    eq_epoch: AtomicU64,
    eq_gains_db: Mutex<[f32; EQ_BANDS]>,

    main_gain: AtomicF32,
    /// Main device applies volume itself, pipeline must not scale twice
    main_device_manages_volume: AtomicBool,

    prelisten_gain: AtomicF32,
    prelisten_dest: AtomicU8,

    pub vis: VisTap,
}

impl Default for DspShared {
    fn default() -> Self {
        Self {
            av_enabled: AtomicBool::new(true),
            av_desired_volume: AtomicF32::new(1.0),
            av_max_gain: AtomicF32::new(5.0),
            av_calculated_gain: AtomicF32::new(1.0),
            eq_enabled: AtomicBool::new(false),
            eq_epoch: AtomicU64::new(0),
            eq_gains_db: Mutex::new([0.0; EQ_BANDS]),
            main_gain: AtomicF32::new(1.0),
            main_device_manages_volume: AtomicBool::new(false),
            prelisten_gain: AtomicF32::new(1.0),
            prelisten_dest: AtomicU8::new(dest_to_u8(PrelistenDest::Mix)),
            vis: VisTap::default(),
        }
    }
}

fn dest_to_u8(dest: PrelistenDest) -> u8 {
    match dest {
        PrelistenDest::Mix => 0,
        PrelistenDest::Left => 1,
        PrelistenDest::Right => 2,
        PrelistenDest::OwnOutput => 3,
    }
}

fn dest_from_u8(v: u8) -> PrelistenDest {
    match v {
        1 => PrelistenDest::Left,
        2 => PrelistenDest::Right,
        3 => PrelistenDest::OwnOutput,
        _ => PrelistenDest::Mix,
    }
}

impl DspShared {
    pub fn set_av_enabled(&self, on: bool) {
        self.av_enabled.store(on, Ordering::Relaxed);
    }

    pub fn av_enabled(&self) -> bool {
        self.av_enabled.load(Ordering::Relaxed)
    }

    pub fn set_av_desired_volume(&self, v: f32) {
        self.av_desired_volume.store(v);
    }

    pub fn set_av_max_gain(&self, v: f32) {
        self.av_max_gain.store(v);
    }

    /// Gain the pipeline last applied to the on-air stream.
    pub fn av_calculated_gain(&self) -> f32 {
        self.av_calculated_gain.load()
    }

    pub fn set_eq_enabled(&self, on: bool) {
        self.eq_enabled.store(on, Ordering::Relaxed);
    }

    pub fn set_eq_band_gains(&self, gains_db: &[f32; EQ_BANDS]) {
        if let Ok(mut g) = self.eq_gains_db.lock() {
            *g = *gains_db;
        }
        self.eq_epoch.fetch_add(1, Ordering::Release);
    }

    pub fn set_main_gain(&self, gain: f32) {
        self.main_gain.store(gain);
    }

    pub fn set_main_device_manages_volume(&self, managed: bool) {
        self.main_device_manages_volume.store(managed, Ordering::Relaxed);
    }

    pub fn set_prelisten_gain(&self, gain: f32) {
        self.prelisten_gain.store(gain);
    }

    pub fn set_prelisten_dest(&self, dest: PrelistenDest) {
        self.prelisten_dest.store(dest_to_u8(dest), Ordering::Relaxed);
    }

    pub fn prelisten_dest(&self) -> PrelistenDest {
        dest_from_u8(self.prelisten_dest.load(Ordering::Relaxed))
    }
}

/// Per-stream processing state, shared between the control thread and the
/// stream's rendering thread via `Arc`.
pub struct StreamDsp {
    id: StreamId,
    route: StreamRoute,
    shared: Arc<DspShared>,
    signals: SignalSender,

    volume_calc: Mutex<VolumeCalc>,
    pub fade: VolumeFade,
    equalizer: Mutex<Equalizer>,
    eq_epoch_seen: AtomicU64,

    /// This stream is the one on air (feeds display gain and vis tap)
    on_air: AtomicBool,
    is_video: AtomicBool,
    /// Timing as last reported by the backend, for end-of-playback flush
    decoded_ms: AtomicU64,

    auto_delete_armed: AtomicBool,
    auto_delete_sent: AtomicBool,
}

impl StreamDsp {
    pub fn new(
        id: StreamId,
        route: StreamRoute,
        shared: Arc<DspShared>,
        signals: SignalSender,
    ) -> Self {
        Self {
            id,
            route,
            shared,
            signals,
            volume_calc: Mutex::new(VolumeCalc::new()),
            fade: VolumeFade::new(),
            equalizer: Mutex::new(Equalizer::new()),
            eq_epoch_seen: AtomicU64::new(0),
            on_air: AtomicBool::new(false),
            is_video: AtomicBool::new(false),
            decoded_ms: AtomicU64::new(0),
            auto_delete_armed: AtomicBool::new(false),
            auto_delete_sent: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn route(&self) -> StreamRoute {
        self.route
    }

    /// Forward a signal to the control thread.
    pub fn post_signal(&self, signal: StreamSignal) {
        self.signals.post(signal);
    }

    pub fn set_on_air(&self, on_air: bool) {
        self.on_air.store(on_air, Ordering::Relaxed);
    }

    pub fn is_on_air(&self) -> bool {
        self.on_air.load(Ordering::Relaxed)
    }

    /// Mark the media as video; returns true on the first call only.
    pub fn mark_video(&self) -> bool {
        !self.is_video.swap(true, Ordering::Relaxed)
    }

    pub fn is_video(&self) -> bool {
        self.is_video.load(Ordering::Relaxed)
    }

    pub fn note_decoded_ms(&self, ms: u64) {
        self.decoded_ms.store(ms, Ordering::Relaxed);
    }

    pub fn decoded_ms(&self) -> u64 {
        self.decoded_ms.load(Ordering::Relaxed)
    }

    pub fn set_precalculated_gain(&self, gain: Option<f32>) {
        if let Ok(mut vc) = self.volume_calc.lock() {
            vc.set_precalculated_gain(gain);
        }
    }

    /// Measured gain for the library flush, when the estimate is solid.
    pub fn measured_gain_if_worth_saving(&self) -> Option<f32> {
        let vc = self.volume_calc.lock().ok()?;
        vc.is_gain_worth_saving().then(|| vc.measured_gain())
    }

    /// Start fading out and request destruction once silence is reached.
    pub fn begin_fade_out(&self, ms: u64, curve: jbx_common::FadeCurve) {
        self.auto_delete_armed.store(true, Ordering::Release);
        self.fade.slide_to(0.0, ms, curve);
    }

    /// Process one interleaved buffer in place.
    pub fn process_buffer(&self, samples: &mut [f32], sample_rate: u32, channels: u16) {
        let on_air = self.is_on_air();

        // Stage 1+2: gain estimation always runs; scaling only when
        // auto-volume is enabled.
        if let Ok(mut vc) = self.volume_calc.lock() {
            vc.add_buffer(samples, sample_rate, channels);
            if self.shared.av_enabled() {
                let applied = vc.adjust_buffer(
                    samples,
                    self.shared.av_desired_volume.load(),
                    self.shared.av_max_gain.load(),
                );
                if on_air {
                    self.shared.av_calculated_gain.store(applied);
                }
            }
        }

        // Stage 3: equalizer, with a cheap epoch check for new band gains.
        if self.shared.eq_enabled.load(Ordering::Relaxed) {
            let epoch = self.shared.eq_epoch.load(Ordering::Acquire);
            if let Ok(mut eq) = self.equalizer.lock() {
                if self.eq_epoch_seen.swap(epoch, Ordering::Relaxed) != epoch {
                    if let Ok(gains) = self.shared.eq_gains_db.lock() {
                        eq.set_band_gains(&gains);
                    }
                }
                eq.process(samples, sample_rate, channels);
            }
        }

        // Stage 4: visualization sees the on-air stream post-EQ, pre-fade.
        if on_air {
            self.shared.vis.push(samples);
        }

        // Stage 5: fade envelope; a fade-out that settled at silence asks
        // the control thread for destruction, at most once per stream.
        let silent = self.fade.adjust_buffer(samples, sample_rate, channels);
        if silent
            && self.auto_delete_armed.load(Ordering::Acquire)
            && !self.auto_delete_sent.swap(true, Ordering::AcqRel)
        {
            self.signals.post(StreamSignal::AutoDelete(self.id));
        }

        // Stage 6: routing and final volume.
        match self.route {
            StreamRoute::Main => {
                if !self.shared.main_device_manages_volume.load(Ordering::Relaxed) {
                    scale(samples, self.shared.main_gain.load());
                }
            }
            StreamRoute::Prelisten => {
                scale(samples, self.shared.prelisten_gain.load());
                if channels == 2 {
                    match self.shared.prelisten_dest() {
                        PrelistenDest::Left => {
                            for frame in samples.chunks_exact_mut(2) {
                                frame[1] = 0.0;
                            }
                        }
                        PrelistenDest::Right => {
                            for frame in samples.chunks_exact_mut(2) {
                                frame[0] = 0.0;
                            }
                        }
                        PrelistenDest::Mix | PrelistenDest::OwnOutput => {}
                    }
                }
            }
        }
    }
}

fn scale(samples: &mut [f32], gain: f32) {
    if (gain - 1.0).abs() > f32::EPSILON {
        for s in samples.iter_mut() {
            *s *= gain;
        }
    }
}
