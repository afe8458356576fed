//! Logarithmic band edges and per-band RMS (spec.md §4.I "FFT worker" step 4).

/// Cached band-edge table, rebuilt only when `(n, bars)` changes.
#[derive(Debug, Clone, Default)]
pub struct BandEdges {
    n: usize,
    bars: usize,
    edges: Vec<f64>,
}

impl BandEdges {
    /// Returns the cached edges for `(n, bars)`, rebuilding if either
    /// changed since the last call.
    pub fn get(&mut self, n: usize, bars: usize) -> &[f64] {
        if self.n != n || self.bars != bars || self.edges.is_empty() {
            self.edges = build_log_edges(n, bars);
            self.n = n;
            self.bars = bars;
        }
        &self.edges
    }
}

/// Builds `bars + 1` logarithmically spaced edges across `[1, n]` bin
/// indices (bin 0 was already discarded upstream as the DC bin).
fn build_log_edges(n: usize, bars: usize) -> Vec<f64> {
    let n = n.max(1) as f64;
    let log_start = 1.0_f64.ln();
    let log_end = n.ln();
    (0..=bars)
        .map(|i| {
            let t = i as f64 / bars as f64;
            (log_start + (log_end - log_start) * t).exp()
        })
        .collect()
}

/// Computes the RMS magnitude within each of `bars` logarithmic bands.
pub fn band_rms(magnitudes: &[f64], edges: &[f64]) -> Vec<f64> {
    let bars = edges.len().saturating_sub(1);
    let mut out = vec![0.0; bars];
    for (b, out_slot) in out.iter_mut().enumerate() {
        let lo = edges[b].floor().max(0.0) as usize;
        let hi = (edges[b + 1].floor() as usize).min(magnitudes.len());
        let (lo, hi) = if lo >= hi { (lo.min(magnitudes.len().saturating_sub(1)), lo.min(magnitudes.len().saturating_sub(1)) + 1) } else { (lo, hi) };
        let hi = hi.min(magnitudes.len());
        if lo >= hi {
            continue;
        }
        let slice = &magnitudes[lo..hi];
        let sum_sq: f64 = slice.iter().map(|v| v * v).sum();
        *out_slot = (sum_sq / slice.len() as f64).sqrt();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn edges_span_full_range_and_are_monotonic() {
        let mut cache = BandEdges::default();
        let edges = cache.get(512, 16).to_vec();
        assert_eq!(edges.len(), 17);
        assert!(edges.windows(2).all(|w| w[1] >= w[0]));
        assert!((edges[0] - 1.0).abs() < 1e-9);
        assert!((edges[16] - 512.0).abs() < 1e-6);
    }

    #[test]
    fn cache_rebuilds_only_on_shape_change() {
        let mut cache = BandEdges::default();
        let first = cache.get(512, 16).to_vec();
        let second = cache.get(512, 16).to_vec();
        assert_eq!(first, second);
        let third = cache.get(512, 8);
        assert_eq!(third.len(), 9);
    }

    #[test]
    fn band_rms_matches_bands_count() {
        let magnitudes = vec![1.0; 512];
        let mut cache = BandEdges::default();
        let edges = cache.get(512, 16).to_vec();
        let rms = band_rms(&magnitudes, &edges);
        assert_eq!(rms.len(), 16);
        assert!(rms.iter().all(|&v| (v - 1.0).abs() < 1e-9));
    }
}
