//! Weighted nearest-generator assignment.

use glam::DVec2;

use crate::config::TessellationMode;
use crate::pixels::PixelSet;
use crate::tessellation::BinSums;

/// Per-bin distance weight (1 / scale²).
///
/// Weighted mode uses the area-normalised S/N, floored at `min_weight` so
/// bins with little or negative signal cannot grow without bound. Equal-scale
/// mode gives every bin weight 1.
pub fn bin_weights(sums: &[BinSums], mode: TessellationMode, min_weight: f64) -> Vec<f64> {
    match mode {
        TessellationMode::EqualScale => vec![1.0; sums.len()],
        TessellationMode::Weighted => sums
            .iter()
            .map(|s| {
                let weight = s.sn() / s.area as f64;
                // NaN (empty bin) falls back to the floor as well
                if weight > min_weight {
                    weight
                } else {
                    min_weight
                }
            })
            .collect(),
    }
}

/// Scale length of each bin, the inverse square root of its weight.
pub fn scales(weights: &[f64]) -> Vec<f64> {
    weights.iter().map(|w| 1.0 / w.sqrt()).collect()
}

/// Bin minimising `|p - g|² × weight`. Ties go to the lowest bin id.
#[inline]
pub fn nearest_generator(point: DVec2, generators: &[DVec2], weights: &[f64]) -> u32 {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (bin, (g, w)) in generators.iter().zip(weights).enumerate() {
        let dist = point.distance_squared(*g) * w;
        if dist < best_dist {
            best = bin;
            best_dist = dist;
        }
    }
    best as u32
}

/// Assign every pixel to its weighted-nearest generator.
///
/// Pixels are independent; the work is split over index ranges and each
/// slot of `assignment` is written exactly once.
pub fn retessellate(
    pixels: &PixelSet,
    generators: &[DVec2],
    weights: &[f64],
    assignment: &mut [u32],
) {
    debug_assert_eq!(assignment.len(), pixels.len());
    common::parallel::fill_indexed(assignment, |i| {
        nearest_generator(pixels.position(i), generators, weights)
    });
}
