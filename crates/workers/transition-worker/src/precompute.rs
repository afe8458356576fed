//! Per-transition-type precomputation (spec.md §4.I "Transition worker").

use crate::config::TransitionConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

fn u32_param(params: &Value, key: &str, default: u32) -> u32 {
    params.get(key).and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(default)
}

fn seed_param(params: &Value) -> Option<u64> {
    params.get("seed").and_then(|v| v.as_u64())
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Dispatches by lowercased `transition_type`; unknown tags report
/// `{"precomputed": false}` per spec.md §4.I.
pub fn precompute(transition_type: &str, params: &Value, config: &TransitionConfig) -> Value {
    match transition_type.to_lowercase().as_str() {
        "diffuse" => precompute_diffuse(params, config),
        "blockflip" | "blockspin" | "blockpuzzle" => precompute_blocks(params, config),
        "warp" => precompute_warp(params, config),
        "particle" => precompute_particles(params, config),
        "raindrops" => precompute_raindrops(params, config),
        "crumble" => precompute_crumble(params, config),
        _ => json!({ "precomputed": false }),
    }
}

fn precompute_diffuse(params: &Value, config: &TransitionConfig) -> Value {
    let block_size = u32_param(params, "block_size", config.diffuse_block_size).max(1);
    let width = u32_param(params, "screen_width", config.screen_width);
    let height = u32_param(params, "screen_height", config.screen_height);
    let mut rng = make_rng(seed_param(params));

    let cols = width.div_ceil(block_size);
    let rows = height.div_ceil(block_size);
    let total_blocks = (cols * rows) as usize;

    let mut indices: Vec<usize> = (0..total_blocks).collect();
    indices.shuffle(&mut rng);
    let order_of: Vec<usize> = inverse_permutation(&indices);

    let blocks: Vec<Value> = indices
        .iter()
        .map(|&idx| {
            let row = idx as u32 / cols;
            let col = idx as u32 % cols;
            let x = col * block_size;
            let y = row * block_size;
            let w = block_size.min(width.saturating_sub(x));
            let h = block_size.min(height.saturating_sub(y));
            json!({ "x": x, "y": y, "w": w, "h": h, "order": order_of[idx] })
        })
        .collect();

    json!({
        "precomputed": true,
        "block_size": block_size,
        "cols": cols,
        "rows": rows,
        "total_blocks": total_blocks,
        "dissolution_order": indices,
        "blocks": blocks,
    })
}

fn precompute_blocks(params: &Value, config: &TransitionConfig) -> Value {
    let cols = u32_param(params, "cols", config.block_cols).max(1);
    let rows = u32_param(params, "rows", config.block_rows).max(1);
    let width = u32_param(params, "screen_width", config.screen_width);
    let height = u32_param(params, "screen_height", config.screen_height);
    let mut rng = make_rng(seed_param(params));

    let block_w = width / cols;
    let block_h = height / rows;
    let total_blocks = (cols * rows) as usize;

    let mut indices: Vec<usize> = (0..total_blocks).collect();
    indices.shuffle(&mut rng);
    let order_of = inverse_permutation(&indices);

    let cx = cols / 2;
    let cy = rows / 2;
    let blocks: Vec<Value> = (0..total_blocks)
        .map(|idx| {
            let row = idx as u32 / cols;
            let col = idx as u32 % cols;
            let x = col * block_w;
            let y = row * block_h;
            let distance = col.abs_diff(cx) + row.abs_diff(cy);
            let flip_axis = if rng.gen_bool(0.5) { "x" } else { "y" };
            json!({
                "x": x, "y": y, "w": block_w, "h": block_h,
                "order": order_of[idx], "distance": distance, "flip_axis": flip_axis,
            })
        })
        .collect();

    json!({
        "precomputed": true,
        "cols": cols,
        "rows": rows,
        "block_w": block_w,
        "block_h": block_h,
        "total_blocks": total_blocks,
        "flip_order": indices,
        "blocks": blocks,
    })
}

fn precompute_warp(params: &Value, config: &TransitionConfig) -> Value {
    let grid_size = u32_param(params, "grid_size", config.warp_grid_size).max(2) as usize;

    let step = 1.0 / (grid_size - 1) as f64;
    let mut u_coords = vec![vec![0.0; grid_size]; grid_size];
    let mut v_coords = vec![vec![0.0; grid_size]; grid_size];
    let mut center_dist = vec![vec![0.0; grid_size]; grid_size];
    let mut angle = vec![vec![0.0; grid_size]; grid_size];

    for (row, (((u_row, v_row), dist_row), angle_row)) in u_coords
        .iter_mut()
        .zip(v_coords.iter_mut())
        .zip(center_dist.iter_mut())
        .zip(angle.iter_mut())
        .enumerate()
    {
        let v = row as f64 * step;
        for (col, (((u_cell, v_cell), dist_cell), angle_cell)) in
            u_row.iter_mut().zip(v_row.iter_mut()).zip(dist_row.iter_mut()).zip(angle_row.iter_mut()).enumerate()
        {
            let u = col as f64 * step;
            *u_cell = u;
            *v_cell = v;
            let dx = u - 0.5;
            let dy = v - 0.5;
            *dist_cell = (dx * dx + dy * dy).sqrt();
            *angle_cell = dy.atan2(dx);
        }
    }

    json!({
        "precomputed": true,
        "grid_size": grid_size,
        "u_coords": u_coords,
        "v_coords": v_coords,
        "center_dist": center_dist,
        "angle": angle,
    })
}

fn precompute_particles(params: &Value, config: &TransitionConfig) -> Value {
    let count = u32_param(params, "particle_count", config.particle_count);
    let width = u32_param(params, "screen_width", config.screen_width) as f64;
    let height = u32_param(params, "screen_height", config.screen_height) as f64;
    let mut rng = make_rng(seed_param(params));

    let particles: Vec<Value> = (0..count)
        .map(|_| {
            json!({
                "x": rng.gen_range(0.0..width),
                "y": rng.gen_range(0.0..height),
                "vx": rng.gen_range(-2.0..2.0),
                "vy": rng.gen_range(-2.0..2.0),
                "size": rng.gen_range(2.0..8.0),
                "alpha": rng.gen_range(0.3..1.0),
                "rotation": rng.gen_range(0.0..360.0),
            })
        })
        .collect();

    json!({ "precomputed": true, "particle_count": count, "particles": particles })
}

fn precompute_raindrops(params: &Value, config: &TransitionConfig) -> Value {
    let count = u32_param(params, "drop_count", 50);
    let width = u32_param(params, "screen_width", config.screen_width) as f64;
    let height = u32_param(params, "screen_height", config.screen_height) as f64;
    let mut rng = make_rng(seed_param(params));

    let drops: Vec<Value> = (0..count)
        .map(|i| {
            let delay = i as f64 / count.max(1) as f64 * 0.6;
            json!({
                "x": rng.gen_range(0.0..width),
                "y": rng.gen_range(0.0..height),
                "radius": rng.gen_range(20.0..100.0),
                "delay": delay,
                "duration": rng.gen_range(0.3..0.6),
            })
        })
        .collect();

    json!({ "precomputed": true, "drop_count": count, "drops": drops })
}

fn precompute_crumble(params: &Value, config: &TransitionConfig) -> Value {
    let cols = u32_param(params, "cols", 12).max(1);
    let rows = u32_param(params, "rows", 8).max(1);
    let width = u32_param(params, "screen_width", config.screen_width) as f64;
    let height = u32_param(params, "screen_height", config.screen_height) as f64;
    let mut rng = make_rng(seed_param(params));

    let frag_w = width / cols as f64;
    let frag_h = height / rows as f64;

    let mut fragments = Vec::with_capacity((cols * rows) as usize);
    for row in 0..rows {
        for col in 0..cols {
            let x = col as f64 * frag_w;
            let y = row as f64 * frag_h;
            fragments.push(json!({
                "x": x, "y": y, "w": frag_w, "h": frag_h,
                "fall_delay": rng.gen_range(0.0..0.5),
                "fall_rotation": rng.gen_range(-180.0..180.0),
                "fall_offset_x": rng.gen_range(-50.0..50.0),
            }));
        }
    }

    json!({ "precomputed": true, "cols": cols, "rows": rows, "fragments": fragments })
}

/// Given a permutation `perm` (dissolution/flip order), returns for each
/// original index the position at which it appears in `perm`.
fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; perm.len()];
    for (position, &original_index) in perm.iter().enumerate() {
        inverse[original_index] = position;
    }
    inverse
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn same_seed_yields_identical_diffuse_output() {
        let config = TransitionConfig::default();
        let params = json!({"block_size": 20, "seed": 123});
        let a = precompute("Diffuse", &params, &config);
        let b = precompute("Diffuse", &params, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_type_reports_not_precomputed() {
        let config = TransitionConfig::default();
        let out = precompute("Dissolve", &json!({}), &config);
        assert_eq!(out["precomputed"], false);
    }

    #[test]
    fn blocks_cover_full_grid_with_a_valid_order() {
        let config = TransitionConfig::default();
        let out = precompute("BlockFlip", &json!({"cols": 4, "rows": 3, "seed": 7}), &config);
        assert_eq!(out["total_blocks"], 12);
        assert_eq!(out["blocks"].as_array().unwrap().len(), 12);
    }

    #[test]
    fn warp_grid_has_requested_size() {
        let config = TransitionConfig::default();
        let out = precompute("Warp", &json!({"grid_size": 8}), &config);
        assert_eq!(out["u_coords"].as_array().unwrap().len(), 8);
    }
}
