//! Running replay-gain estimation
//!
//! Estimates a normalization gain for a stream while it plays, from the
//! per-channel RMS of short slices smoothed over a sliding window. The
//! estimate converges toward the loudest sustained passage seen so far;
//! once a level has been reached the gain only ever decreases.
//!
//! Runs on the rendering thread for every buffer, so the hot path is a
//! clamp, a multiply-add and a countdown per subsample.

/// Reference RMS level a normalized track should reach
pub const REFERENCE_LEVEL: f64 = 0.25;

/// Slices per smoothing window; one slice is 1/100 s of audio
pub const SMOOTH_SIZE: usize = 100;

/// Samples beyond this are treated as clipped and ignored for the estimate
const TOLERANCE: f32 = 1.4;

/// Cap while the gain is only a running estimate (no library value known)
pub const MAX_UNKNOWN_GAIN: f32 = 3.1;

/// Loud tracks are attenuated at most to this factor
pub const MIN_GAIN: f32 = 0.5;

const MAX_CHANNELS: usize = 2;

/// Per-stream gain estimator.
pub struct VolumeCalc {
    /// Gain measured so far, 1.0 until the first slice completes
    measured_gain: f32,
    /// Library-provided gain; an upper bound for the estimate
    precalculated: Option<f32>,

    /// Loudest smoothed level seen so far, negative until known
    max_level: f64,

    sample_rate: u32,
    channels: usize,
    frames_per_slice: u64,
    frames_left_in_slice: u64,

    /// Sum of squares for the slice in progress, per channel
    sum: [f64; MAX_CHANNELS],
    /// Smoothing window of recent slice RMS levels, per channel
    smooth: [[f64; SMOOTH_SIZE]; MAX_CHANNELS],
    smooth_pos: usize,
    smooth_count: usize,
}

impl Default for VolumeCalc {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeCalc {
    pub fn new() -> Self {
        Self {
            measured_gain: 1.0,
            precalculated: None,
            max_level: -1.0,
            sample_rate: 0,
            channels: 0,
            frames_per_slice: 0,
            frames_left_in_slice: 0,
            sum: [0.0; MAX_CHANNELS],
            smooth: [[0.0; SMOOTH_SIZE]; MAX_CHANNELS],
            smooth_pos: 0,
            smooth_count: 0,
        }
    }

    /// Adopt a gain computed in an earlier playback of the same media.
    pub fn set_precalculated_gain(&mut self, gain: Option<f32>) {
        self.precalculated = gain.filter(|g| *g > 0.0);
    }

    /// The estimate alone, regardless of any library value.
    pub fn measured_gain(&self) -> f32 {
        self.measured_gain
    }

    /// True once the estimate covered at least one full smoothing window
    /// and no library value made measuring redundant.
    pub fn is_gain_worth_saving(&self) -> bool {
        self.precalculated.is_none() && self.smooth_count >= SMOOTH_SIZE
    }

    /// Feed interleaved samples into the estimator.
    pub fn add_buffer(&mut self, samples: &[f32], sample_rate: u32, channels: u16) {
        let channels = channels as usize;
        if channels == 0 || channels > MAX_CHANNELS || sample_rate == 0 {
            return;
        }
        if self.sample_rate != sample_rate || self.channels != channels {
            self.sample_rate = sample_rate;
            self.channels = channels;
            self.frames_per_slice = (sample_rate as u64 / SMOOTH_SIZE as u64).max(1);
            self.frames_left_in_slice = self.frames_per_slice;
            self.sum = [0.0; MAX_CHANNELS];
        }

        for frame in samples.chunks_exact(channels) {
            for (c, sample) in frame.iter().enumerate() {
                let s = sample.clamp(-TOLERANCE, TOLERANCE) as f64;
                self.sum[c] += s * s;
            }

            self.frames_left_in_slice -= 1;
            if self.frames_left_in_slice == 0 {
                self.complete_slice();
                self.frames_left_in_slice = self.frames_per_slice;
            }
        }
    }

    fn complete_slice(&mut self) {
        let frames = self.frames_per_slice as f64;
        for c in 0..self.channels {
            self.smooth[c][self.smooth_pos] = (self.sum[c] / frames).sqrt();
            self.sum[c] = 0.0;
        }
        self.smooth_pos = (self.smooth_pos + 1) % SMOOTH_SIZE;
        self.smooth_count += 1;

        let window = self.smooth_count.min(SMOOTH_SIZE);
        let mut level: f64 = 0.0;
        for c in 0..self.channels {
            let avg: f64 = self.smooth[c][..window].iter().sum::<f64>() / window as f64;
            if avg > level {
                level = avg;
            }
        }

        if level > self.max_level && level > f64::EPSILON {
            self.max_level = level;
            self.measured_gain = ((REFERENCE_LEVEL / level) as f32).max(MIN_GAIN);
        }
    }

    /// Scale the buffer by the current gain.
    ///
    /// The running estimate is capped by the library value when one is
    /// known, otherwise at [`MAX_UNKNOWN_GAIN`]; after the desired volume
    /// is applied the result stays within `[MIN_GAIN, max_gain]`.
    pub fn adjust_buffer(&self, samples: &mut [f32], desired_volume: f32, max_gain: f32) -> f32 {
        let cap = self.precalculated.unwrap_or(MAX_UNKNOWN_GAIN);
        let gain = (self.measured_gain.min(cap) * desired_volume).clamp(MIN_GAIN, max_gain);

        if (gain - 1.0).abs() > f32::EPSILON {
            for s in samples.iter_mut() {
                *s *= gain;
            }
        }
        gain
    }
}
