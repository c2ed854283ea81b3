//! Graphic equalizer
//!
//! Ten octave bands of peaking biquads, one filter chain per channel.
//! Coefficients are recomputed when the band gains or the sample rate
//! change; filter state is per stream so streams never share history.

/// Band center frequencies in Hz
pub const BAND_FREQS: [f32; EQ_BANDS] = [
    31.0, 62.0, 125.0, 250.0, 500.0, 1_000.0, 2_000.0, 4_000.0, 8_000.0, 16_000.0,
];

pub const EQ_BANDS: usize = 10;

/// Band gain limits in dB
pub const BAND_GAIN_MIN_DB: f32 = -12.0;
pub const BAND_GAIN_MAX_DB: f32 = 12.0;

const MAX_CHANNELS: usize = 2;
const BAND_Q: f32 = 1.1;

#[derive(Debug, Clone, Copy, Default)]
struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Biquad {
    /// Peaking EQ coefficients (Audio EQ Cookbook form, normalized by a0).
    fn peaking(freq: f32, sample_rate: f32, gain_db: f32) -> Self {
        let a = 10f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let alpha = w0.sin() / (2.0 * BAND_Q);
        let cos_w0 = w0.cos();

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    fn identity() -> Self {
        Self {
            b0: 1.0,
            ..Default::default()
        }
    }

    fn is_identity(&self) -> bool {
        self.b0 == 1.0 && self.b1 == 0.0 && self.b2 == 0.0 && self.a1 == 0.0 && self.a2 == 0.0
    }
}

/// Transposed direct form II state
#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    z1: f32,
    z2: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, c: &Biquad, x: f32) -> f32 {
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }
}

/// Per-stream equalizer instance.
pub struct Equalizer {
    gains_db: [f32; EQ_BANDS],
    sample_rate: u32,
    coeffs: [Biquad; EQ_BANDS],
    state: [[BiquadState; EQ_BANDS]; MAX_CHANNELS],
    dirty: bool,
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Equalizer {
    pub fn new() -> Self {
        Self {
            gains_db: [0.0; EQ_BANDS],
            sample_rate: 0,
            coeffs: [Biquad::identity(); EQ_BANDS],
            state: [[BiquadState::default(); EQ_BANDS]; MAX_CHANNELS],
            dirty: false,
        }
    }

    /// Replace all band gains (dB, clamped to the band limits).
    pub fn set_band_gains(&mut self, gains_db: &[f32; EQ_BANDS]) {
        for (dst, src) in self.gains_db.iter_mut().zip(gains_db) {
            *dst = src.clamp(BAND_GAIN_MIN_DB, BAND_GAIN_MAX_DB);
        }
        self.dirty = true;
    }

    pub fn band_gains(&self) -> &[f32; EQ_BANDS] {
        &self.gains_db
    }

    fn recompute(&mut self, sample_rate: u32) {
        let fs = sample_rate as f32;
        for (band, freq) in BAND_FREQS.iter().enumerate() {
            // Skip bands too close to Nyquist for this rate.
            self.coeffs[band] = if *freq < fs * 0.45 && self.gains_db[band].abs() > 0.01 {
                Biquad::peaking(*freq, fs, self.gains_db[band])
            } else {
                Biquad::identity()
            };
        }
        self.sample_rate = sample_rate;
        self.dirty = false;
    }

    /// Filter an interleaved buffer in place.
    pub fn process(&mut self, samples: &mut [f32], sample_rate: u32, channels: u16) {
        let channels = channels as usize;
        if channels == 0 || channels > MAX_CHANNELS || sample_rate == 0 {
            return;
        }
        if self.dirty || self.sample_rate != sample_rate {
            self.recompute(sample_rate);
        }

        for frame in samples.chunks_exact_mut(channels) {
            for (c, sample) in frame.iter_mut().enumerate() {
                let mut x = *sample;
                for band in 0..EQ_BANDS {
                    let coeff = &self.coeffs[band];
                    if !coeff.is_identity() {
                        x = self.state[c][band].process(coeff, x);
                    }
                }
                *sample = x;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    fn tone(freq: f32, rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|i| {
                let v = (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5;
                [v, v]
            })
            .collect()
    }

    #[test]
    fn flat_gains_leave_audio_untouched() {
        let mut eq = Equalizer::new();
        let input = tone(1_000.0, 44_100, 4_410);
        let mut output = input.clone();
        eq.process(&mut output, 44_100, 2);
        assert_eq!(input, output);
    }

    #[test]
    fn boosted_band_raises_its_tone() {
        let mut eq = Equalizer::new();
        let mut gains = [0.0f32; EQ_BANDS];
        gains[5] = 12.0; // 1 kHz
        eq.set_band_gains(&gains);

        let mut buf = tone(1_000.0, 44_100, 44_100);
        let before = rms(&buf);
        eq.process(&mut buf, 44_100, 2);
        // Skip the filter settle-in at the start.
        let after = rms(&buf[8_820..]);
        assert!(after > before * 1.5, "before {} after {}", before, after);
    }

    #[test]
    fn cut_band_lowers_its_tone() {
        let mut eq = Equalizer::new();
        let mut gains = [0.0f32; EQ_BANDS];
        gains[5] = -12.0;
        eq.set_band_gains(&gains);

        let mut buf = tone(1_000.0, 44_100, 44_100);
        let before = rms(&buf);
        eq.process(&mut buf, 44_100, 2);
        let after = rms(&buf[8_820..]);
        assert!(after < before * 0.6, "before {} after {}", before, after);
    }

    #[test]
    fn distant_band_barely_affects_a_tone() {
        let mut eq = Equalizer::new();
        let mut gains = [0.0f32; EQ_BANDS];
        gains[0] = 12.0; // 31 Hz boost
        eq.set_band_gains(&gains);

        let mut buf = tone(4_000.0, 44_100, 44_100);
        let before = rms(&buf);
        eq.process(&mut buf, 44_100, 2);
        let after = rms(&buf[8_820..]);
        assert!((after - before).abs() < before * 0.1);
    }

    #[test]
    fn gains_are_clamped_to_band_limits() {
        let mut eq = Equalizer::new();
        eq.set_band_gains(&[100.0; EQ_BANDS]);
        assert!(eq.band_gains().iter().all(|g| *g == BAND_GAIN_MAX_DB));
    }

    #[test]
    fn nyquist_adjacent_bands_are_skipped_at_low_rates() {
        let mut eq = Equalizer::new();
        let mut gains = [0.0f32; EQ_BANDS];
        gains[9] = 12.0; // 16 kHz band, impossible at 22.05 kHz output
        eq.set_band_gains(&gains);

        let input = tone(2_000.0, 22_050, 22_050);
        let mut output = input.clone();
        eq.process(&mut output, 22_050, 2);
        assert_eq!(input, output);
    }
}
