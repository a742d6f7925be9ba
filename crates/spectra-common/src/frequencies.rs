//! Frequency snapshot helpers shared by the relay and its clients.

use serde::{Deserialize, Serialize};

/// Bins in the placeholder snapshot a member gets when it joins a room.
/// Matches the analyser output of the browser capture (FFT size 512).
pub const PLACEHOLDER_BINS: usize = 256;

/// Bars drawn by the equalizer, mobile and desktop alike.
pub const DISPLAY_BARS: usize = 10;

/// All-zero snapshot used until a member sends its first audio frame.
pub fn zeroed_snapshot() -> Vec<f64> {
    vec![0.0; PLACEHOLDER_BINS]
}

/// Resample `source` to `bars` values by linear interpolation.
///
/// Bar `i` samples the source at the fractional index `i / bars * (n - 1)`,
/// blending the neighbouring bins by the fractional part. An empty source
/// yields `bars` zeros, and a source that already has `bars` values is
/// returned as is.
pub fn interpolate(source: &[f64], bars: usize) -> Vec<f64> {
    let n = source.len();
    if n == 0 {
        return vec![0.0; bars];
    }
    if n == bars {
        return source.to_vec();
    }

    let last = (n - 1) as f64;
    (0..bars)
        .map(|i| {
            let index = i as f64 / bars as f64 * last;
            let floor = index.floor();
            let ceil = index.ceil();
            let lo = source[floor as usize];
            if floor == ceil {
                lo
            } else {
                let weight = index - floor;
                lo * (1.0 - weight) + source[ceil as usize] * weight
            }
        })
        .collect()
}

/// Summary of a bar array, shown next to the equalizer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BarStats {
    pub avg: f64,
    pub peak: f64,
}

impl BarStats {
    pub fn from_bars(bars: &[f64]) -> Self {
        if bars.is_empty() {
            return Self::default();
        }
        let sum: f64 = bars.iter().sum();
        let peak = bars.iter().copied().fold(0.0, f64::max);
        Self {
            avg: sum / bars.len() as f64,
            peak,
        }
    }
}
