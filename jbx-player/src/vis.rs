//! Visualization tap
//!
//! Keeps a short rolling window of the post-EQ samples of whatever stream
//! is on air, for spectrum and oscilloscope style displays. The rendering
//! thread must never block on a UI reader, so writes use `try_lock` and
//! simply skip the window update when a snapshot is being taken.

use std::sync::Mutex;

/// Default window: ~0.25 s of stereo audio at 44.1 kHz
pub const DEFAULT_CAPACITY: usize = 22_050;

struct VisWindow {
    samples: Vec<f32>,
    write_pos: usize,
    filled: bool,
}

/// Shared sample window between the rendering thread and display readers.
pub struct VisTap {
    window: Mutex<VisWindow>,
}

impl Default for VisTap {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl VisTap {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: Mutex::new(VisWindow {
                samples: vec![0.0; capacity.max(2)],
                write_pos: 0,
                filled: false,
            }),
        }
    }

    /// Append samples, overwriting the oldest. Skips silently when a
    /// reader holds the window.
    pub fn push(&self, samples: &[f32]) {
        let Ok(mut win) = self.window.try_lock() else {
            return;
        };
        let cap = win.samples.len();
        for &s in samples {
            let pos = win.write_pos;
            win.samples[pos] = s;
            win.write_pos = (pos + 1) % cap;
            if win.write_pos == 0 {
                win.filled = true;
            }
        }
    }

    /// Copy of the window, oldest sample first.
    pub fn snapshot(&self) -> Vec<f32> {
        let Ok(win) = self.window.lock() else {
            return Vec::new();
        };
        if !win.filled {
            return win.samples[..win.write_pos].to_vec();
        }
        let mut out = Vec::with_capacity(win.samples.len());
        out.extend_from_slice(&win.samples[win.write_pos..]);
        out.extend_from_slice(&win.samples[..win.write_pos]);
        out
    }
}
