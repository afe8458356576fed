//! The per-frame bar pipeline (spec.md §4.I "FFT worker", `FftFrame`).

use crate::bands::{band_rms, BandEdges};
use crate::config::FftConfig;
use crate::profile::profile_weights;
use rustfft::num_complex::Complex64;
use rustfft::FftPlanner;
use std::time::Instant;

/// Frames more than this far apart reset the smoother to avoid decay
/// artefacts from a long gap (spec.md §4.I step 8).
const SMOOTHER_RESET_GAP_SECS: f64 = 2.0;
const CONVOLUTION_KERNEL: [f64; 3] = [0.25, 0.5, 0.25];

/// Bar levels and peaks produced by one `FftFrame` call.
pub struct FftOutput {
    pub bars: Vec<f64>,
    pub peaks: Vec<f64>,
    pub frame_count: u64,
}

/// Carries smoother state and plan/edge caches across frames.
pub struct FftState {
    planner: FftPlanner<f64>,
    edges: BandEdges,
    bars: Vec<f64>,
    peaks: Vec<f64>,
    raw_bass_avg: f64,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl FftState {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            edges: BandEdges::default(),
            bars: Vec::new(),
            peaks: Vec::new(),
            raw_bass_avg: 0.0,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    /// Drops all running smoother state; called on `FftConfig` updates and
    /// on the `dt > 2s` gap reset.
    pub fn reset(&mut self, bars: usize) {
        self.bars = vec![0.0; bars];
        self.peaks = vec![0.0; bars];
        self.raw_bass_avg = 0.0;
        self.last_frame_at = None;
    }

    /// Runs one full sample window through the pipeline, returning the
    /// smoothed bar levels and peaks.
    pub fn compute_frame(&mut self, samples: &[f64], config: &FftConfig) -> FftOutput {
        if self.bars.len() != config.bars {
            self.reset(config.bars);
        }

        let now = Instant::now();
        if let Some(last) = self.last_frame_at {
            if now.duration_since(last).as_secs_f64() > SMOOTHER_RESET_GAP_SECS {
                self.reset(config.bars);
            }
        }
        self.last_frame_at = Some(now);

        let mut magnitudes = real_fft_magnitudes(&mut self.planner, samples);
        for m in magnitudes.iter_mut() {
            *m = m.ln_1p().powf(1.2);
        }
        if magnitudes.len() > 4 {
            magnitudes = convolve_same(&magnitudes, &CONVOLUTION_KERNEL);
        }

        let edges = self.edges.get(magnitudes.len(), config.bars).to_vec();
        let band_levels = band_rms(&magnitudes, &edges);

        let (raw_bass, _raw_mid, _raw_treble) = zone_means(&band_levels);
        let alpha = if raw_bass > self.raw_bass_avg { config.tau_rise } else { config.tau_fall };
        self.raw_bass_avg += alpha * (raw_bass - self.raw_bass_avg);

        let noise_floor = (self.raw_bass_avg * config.sensitivity).clamp(config.noise_floor_min, config.noise_floor_max);

        let weights = profile_weights(config.profile, config.bars);
        for (i, level) in band_levels.iter().enumerate() {
            let above_floor = (level - noise_floor).max(0.0);
            let target = (above_floor * weights.get(i).copied().unwrap_or(1.0)).clamp(0.0, 1.0);

            let current = self.bars[i];
            self.bars[i] = if target > current {
                current + config.attack * (target - current)
            } else {
                current * config.decay + target * (1.0 - config.decay)
            };

            let decayed_peak = self.peaks[i] * config.ghost_decay;
            self.peaks[i] = if config.ghosting_enabled { decayed_peak.max(self.bars[i]) } else { self.bars[i] };
        }

        self.frame_count += 1;
        FftOutput {
            bars: self.bars.clone(),
            peaks: self.peaks.clone(),
            frame_count: self.frame_count,
        }
    }
}

impl Default for FftState {
    fn default() -> Self {
        Self::new()
    }
}

fn real_fft_magnitudes(planner: &mut FftPlanner<f64>, samples: &[f64]) -> Vec<f64> {
    let n = samples.len();
    if n < 2 {
        return Vec::new();
    }
    let mut buffer: Vec<Complex64> = samples.iter().map(|&s| Complex64::new(s, 0.0)).collect();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);
    buffer[1..=n / 2].iter().map(|c| c.norm()).collect()
}

/// Same-length 1D convolution with edge-value padding.
fn convolve_same(values: &[f64], kernel: &[f64; 3]) -> Vec<f64> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let left = if i == 0 { values[0] } else { values[i - 1] };
            let right = if i + 1 == n { values[n - 1] } else { values[i + 1] };
            kernel[0] * left + kernel[1] * values[i] + kernel[2] * right
        })
        .collect()
}

/// Splits band levels into three equal zones and returns each zone's mean.
fn zone_means(band_levels: &[f64]) -> (f64, f64, f64) {
    let n = band_levels.len();
    if n == 0 {
        return (0.0, 0.0, 0.0);
    }
    let third = (n / 3).max(1);
    let bass = mean(&band_levels[..third.min(n)]);
    let mid_end = (2 * third).min(n);
    let mid = mean(&band_levels[third.min(n)..mid_end]);
    let treble = mean(&band_levels[mid_end..n]);
    (bass, mid, treble)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FftConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn silent_window_produces_zero_bars() {
        let config = FftConfig::default();
        let mut state = FftState::new();
        let samples = vec![0.0_f64; 4410];
        let output = state.compute_frame(&samples, &config);
        assert_eq!(output.bars.len(), config.bars);
        assert!(output.bars.iter().all(|&b| b.abs() < 1e-9));
    }

    #[test]
    fn frame_count_increments_each_call() {
        let config = FftConfig::default();
        let mut state = FftState::new();
        let samples = vec![0.0_f64; 256];
        let first = state.compute_frame(&samples, &config);
        let second = state.compute_frame(&samples, &config);
        assert_eq!(first.frame_count, 1);
        assert_eq!(second.frame_count, 2);
    }

    #[test]
    fn reset_zeroes_running_state() {
        let mut state = FftState::new();
        state.bars = vec![0.5; 4];
        state.peaks = vec![0.9; 4];
        state.raw_bass_avg = 0.4;
        state.reset(4);
        assert!(state.bars.iter().all(|&b| b == 0.0));
        assert!(state.peaks.iter().all(|&p| p == 0.0));
        assert_eq!(state.raw_bass_avg, 0.0);
    }
}
