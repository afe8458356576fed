//! Tunable parameters for the bar pipeline (spec.md §4.I "FFT worker",
//! `FftConfig`).

use serde::{Deserialize, Serialize};

/// Which template shapes the per-bar profile weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileShape {
    /// Static 15-element template, resampled to `bars`.
    Legacy,
    /// Cosine-bell + bass/vocal/centre zone blending.
    Curved,
}

/// Canonical tuning, matching the constants spec.md calls out by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FftConfig {
    pub bars: usize,
    /// Smoothing rise coefficient for the running bass average (canonical 0.15).
    pub tau_rise: f64,
    /// Smoothing fall coefficient for the running bass average (canonical 0.4).
    pub tau_fall: f64,
    /// Per-frame attack coefficient toward the target bar value (canonical 0.85).
    pub attack: f64,
    /// Per-frame decay coefficient toward the target bar value (canonical 0.35).
    pub decay: f64,
    pub noise_floor_min: f64,
    pub noise_floor_max: f64,
    /// Scales the noise floor derived from the running bass average; clamped to [0.25, 2.5].
    pub sensitivity: f64,
    pub profile: ProfileShape,
    pub ghosting_enabled: bool,
    /// Peak ghost decay coefficient (canonical 0.85).
    pub ghost_decay: f64,
}

impl Default for FftConfig {
    fn default() -> Self {
        Self {
            bars: 32,
            tau_rise: 0.15,
            tau_fall: 0.4,
            attack: 0.85,
            decay: 0.35,
            noise_floor_min: 0.02,
            noise_floor_max: 0.3,
            sensitivity: 1.0,
            profile: ProfileShape::Legacy,
            ghosting_enabled: true,
            ghost_decay: 0.85,
        }
    }
}

impl FftConfig {
    /// Clamps `sensitivity` to spec.md's documented bound.
    pub fn clamp_sensitivity(&mut self) {
        self.sensitivity = self.sensitivity.clamp(0.25, 2.5);
    }

    /// Applies a partial JSON update, keeping fields not present unchanged.
    pub fn apply_update(&mut self, update: &serde_json::Value) {
        if let Some(bars) = update.get("bars").and_then(|v| v.as_u64()) {
            self.bars = bars as usize;
        }
        if let Some(v) = update.get("tau_rise").and_then(|v| v.as_f64()) {
            self.tau_rise = v;
        }
        if let Some(v) = update.get("tau_fall").and_then(|v| v.as_f64()) {
            self.tau_fall = v;
        }
        if let Some(v) = update.get("attack").and_then(|v| v.as_f64()) {
            self.attack = v;
        }
        if let Some(v) = update.get("decay").and_then(|v| v.as_f64()) {
            self.decay = v;
        }
        if let Some(v) = update.get("noise_floor_min").and_then(|v| v.as_f64()) {
            self.noise_floor_min = v;
        }
        if let Some(v) = update.get("noise_floor_max").and_then(|v| v.as_f64()) {
            self.noise_floor_max = v;
        }
        if let Some(v) = update.get("sensitivity").and_then(|v| v.as_f64()) {
            self.sensitivity = v;
        }
        if let Some(v) = update.get("ghosting_enabled").and_then(|v| v.as_bool()) {
            self.ghosting_enabled = v;
        }
        if let Some(v) = update.get("ghost_decay").and_then(|v| v.as_f64()) {
            self.ghost_decay = v;
        }
        if let Some(shape) = update.get("profile").and_then(|v| v.as_str()) {
            self.profile = match shape {
                "curved" => ProfileShape::Curved,
                _ => ProfileShape::Legacy,
            };
        }
        self.clamp_sensitivity();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_update_only_touches_named_fields() {
        let mut config = FftConfig::default();
        config.apply_update(&serde_json::json!({"bars": 64, "sensitivity": 9.0}));
        assert_eq!(config.bars, 64);
        assert_eq!(config.sensitivity, 2.5);
        assert_eq!(config.attack, 0.85);
    }
}
