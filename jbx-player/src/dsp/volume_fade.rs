//! Sub-sample fade envelope
//!
//! Applies a gain ramp positioned in individual subsamples, so a slide
//! started mid-buffer continues seamlessly across buffer boundaries and
//! across buffers of different sizes. The subsample total is computed
//! lazily on the first buffer after a slide request, because the sample
//! rate is only reliably known on the rendering thread.
//!
//! Shared between the control thread (which starts slides) and the
//! rendering thread (which advances them); a small per-stream mutex guards
//! the envelope state.

use jbx_common::FadeCurve;
use std::sync::Mutex;

/// Gains at or below this count as silence
const SILENCE: f32 = 0.0001;

#[derive(Debug, Clone, Copy)]
enum SlidePhase {
    /// No slide in progress, `dest_gain` applies as a constant
    Idle,
    /// Slide requested, subsample total not yet computed
    Pending { ms: u64 },
    /// Slide running, positioned in subsamples
    Active { total_subsams: u64, pos: u64 },
}

#[derive(Debug)]
struct FadeState {
    start_gain: f32,
    dest_gain: f32,
    curve: FadeCurve,
    phase: SlidePhase,
}

/// Fade envelope for one stream.
pub struct VolumeFade {
    state: Mutex<FadeState>,
}

impl Default for VolumeFade {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeFade {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FadeState {
                start_gain: 1.0,
                dest_gain: 1.0,
                curve: FadeCurve::Linear,
                phase: SlidePhase::Idle,
            }),
        }
    }

    /// Set a constant gain, cancelling any slide in progress.
    pub fn set_gain(&self, gain: f32) {
        if let Ok(mut state) = self.state.lock() {
            state.start_gain = gain;
            state.dest_gain = gain;
            state.phase = SlidePhase::Idle;
        }
    }

    /// Start a slide from the current gain toward `dest_gain` over `ms`.
    pub fn slide_to(&self, dest_gain: f32, ms: u64, curve: FadeCurve) {
        if let Ok(mut state) = self.state.lock() {
            let from = current_gain(&state);
            state.start_gain = from;
            state.dest_gain = dest_gain;
            state.curve = curve;
            state.phase = if ms == 0 {
                state.start_gain = dest_gain;
                SlidePhase::Idle
            } else {
                SlidePhase::Pending { ms }
            };
        }
    }

    /// The gain this envelope is heading toward.
    pub fn target_gain(&self) -> f32 {
        self.state.lock().map(|s| s.dest_gain).unwrap_or(1.0)
    }

    /// True when the envelope has fully settled at silence.
    pub fn finished_at_silence(&self) -> bool {
        self.state
            .lock()
            .map(|s| matches!(s.phase, SlidePhase::Idle) && s.dest_gain <= SILENCE)
            .unwrap_or(false)
    }

    /// Apply the envelope to an interleaved buffer.
    ///
    /// Returns true when the buffer ends with the envelope settled at
    /// silence, the cue for auto-delete of a faded-out stream.
    pub fn adjust_buffer(&self, samples: &mut [f32], sample_rate: u32, channels: u16) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };

        if let SlidePhase::Pending { ms } = state.phase {
            let total = ms * sample_rate as u64 * channels as u64 / 1000;
            state.phase = if total == 0 {
                state.start_gain = state.dest_gain;
                SlidePhase::Idle
            } else {
                SlidePhase::Active {
                    total_subsams: total,
                    pos: 0,
                }
            };
        }

        match state.phase {
            SlidePhase::Idle | SlidePhase::Pending { .. } => {
                let gain = state.dest_gain;
                if (gain - 1.0).abs() > f32::EPSILON {
                    for s in samples.iter_mut() {
                        *s *= gain;
                    }
                }
                gain <= SILENCE
            }
            SlidePhase::Active { total_subsams, pos } => {
                let start = state.start_gain;
                let diff = state.dest_gain - start;
                let curve = state.curve;
                let mut pos = pos;

                for s in samples.iter_mut() {
                    let gain = if pos >= total_subsams {
                        state.dest_gain
                    } else {
                        let t = pos as f32 / total_subsams as f32;
                        start + diff * curve.rising(t)
                    };
                    *s *= gain;
                    pos += 1;
                }

                if pos >= total_subsams {
                    state.start_gain = state.dest_gain;
                    state.phase = SlidePhase::Idle;
                    state.dest_gain <= SILENCE
                } else {
                    state.phase = SlidePhase::Active { total_subsams, pos };
                    false
                }
            }
        }
    }
}

/// Instantaneous gain for slide restarts.
fn current_gain(state: &FadeState) -> f32 {
    match state.phase {
        SlidePhase::Idle => state.dest_gain,
        SlidePhase::Pending { .. } => state.start_gain,
        SlidePhase::Active { total_subsams, pos } => {
            let t = (pos as f32 / total_subsams as f32).min(1.0);
            state.start_gain + (state.dest_gain - state.start_gain) * state.curve.rising(t)
        }
    }
}
