//! Shared screen/grid defaults for transition precomputation (spec.md §4.I
//! "Transition worker").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub diffuse_block_size: u32,
    pub block_cols: u32,
    pub block_rows: u32,
    pub particle_count: u32,
    pub warp_grid_size: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            diffuse_block_size: 16,
            block_cols: 8,
            block_rows: 6,
            particle_count: 1000,
            warp_grid_size: 32,
            screen_width: 1920,
            screen_height: 1080,
        }
    }
}

impl TransitionConfig {
    /// Applies a partial JSON update, leaving unspecified fields unchanged.
    pub fn apply_update(&mut self, update: &serde_json::Value) {
        macro_rules! apply_u32 {
            ($field:ident) => {
                if let Some(v) = update.get(stringify!($field)).and_then(|v| v.as_u64()) {
                    self.$field = v as u32;
                }
            };
        }
        apply_u32!(diffuse_block_size);
        apply_u32!(block_cols);
        apply_u32!(block_rows);
        apply_u32!(particle_count);
        apply_u32!(warp_grid_size);
        apply_u32!(screen_width);
        apply_u32!(screen_height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn update_only_touches_named_fields() {
        let mut config = TransitionConfig::default();
        config.apply_update(&serde_json::json!({"block_cols": 10}));
        assert_eq!(config.block_cols, 10);
        assert_eq!(config.block_rows, 6);
    }
}
