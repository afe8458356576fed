//! Per-bar profile weights (spec.md §4.I "FFT worker" step 6).

use crate::config::ProfileShape;
use std::f64::consts::PI;

/// Static 15-element template, resampled to `bars` by linear interpolation.
/// Dual-peak, center-out shape: edge edge edge slope PEAK slope shoulder
/// CENTER shoulder slope PEAK slope edge edge edge.
const LEGACY_TEMPLATE: [f64; 15] = [
    0.10, 0.15, 0.25, 0.50, 1.0, 0.45, 0.25, 0.08, 0.25, 0.45, 1.0, 0.50, 0.25, 0.15, 0.10,
];

/// Computes the profile weight for each of `bars` bands.
pub fn profile_weights(shape: ProfileShape, bars: usize) -> Vec<f64> {
    match shape {
        ProfileShape::Legacy => resample_template(&LEGACY_TEMPLATE, bars),
        ProfileShape::Curved => curved_weights(bars),
    }
}

fn resample_template(template: &[f64], bars: usize) -> Vec<f64> {
    if bars == 0 {
        return Vec::new();
    }
    if bars == 1 {
        return vec![template[template.len() / 2]];
    }
    (0..bars)
        .map(|i| {
            let t = i as f64 / (bars - 1) as f64;
            let pos = t * (template.len() - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = (lo + 1).min(template.len() - 1);
            let frac = pos - lo as f64;
            template[lo] * (1.0 - frac) + template[hi] * frac
        })
        .collect()
}

/// Cosine-bell base shape blended with bass / vocal / centre zone weights,
/// so the low end carries more energy than a plain bell curve.
fn curved_weights(bars: usize) -> Vec<f64> {
    if bars == 0 {
        return Vec::new();
    }
    (0..bars)
        .map(|i| {
            let t = if bars == 1 { 0.5 } else { i as f64 / (bars - 1) as f64 };
            let bell = 0.5 - 0.5 * (PI * (2.0 * t - 1.0)).cos();
            let zone = zone_weight(t);
            (0.6 * bell + 0.4 * zone).clamp(0.0, 1.0)
        })
        .collect()
}

/// Bass zone (first third) weighted highest, vocal zone (middle third)
/// moderate, centre/treble zone (last third) lowest.
fn zone_weight(t: f64) -> f64 {
    if t < 1.0 / 3.0 {
        1.0
    } else if t < 2.0 / 3.0 {
        0.75
    } else {
        0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn legacy_resample_preserves_endpoints() {
        let weights = resample_template(&LEGACY_TEMPLATE, 15);
        assert_eq!(weights.len(), 15);
        assert!((weights[0] - LEGACY_TEMPLATE[0]).abs() < 1e-9);
        assert!((weights[14] - LEGACY_TEMPLATE[14]).abs() < 1e-9);
    }

    #[test]
    fn curved_weights_stay_within_unit_range() {
        let weights = profile_weights(ProfileShape::Curved, 32);
        assert_eq!(weights.len(), 32);
        assert!(weights.iter().all(|&w| (0.0..=1.0).contains(&w)));
    }
}
