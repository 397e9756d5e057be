//! Final per-bin statistics and binning quality diagnostics.

use glam::DVec2;
use serde::Serialize;

use crate::pixels::PixelSet;
use crate::tessellation::{bin_members, weighted_centroid, BinSums, Tessellation};

/// Statistics of one final bin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinStats {
    /// Generator point from the last refinement iteration.
    pub generator: DVec2,
    /// Signal-weighted centroid.
    pub centroid: DVec2,
    /// Mean signal per pixel.
    pub signal: f64,
    /// Quadrature-summed noise divided by the area.
    pub noise: f64,
    pub sn: f64,
    pub area: usize,
    pub scale: f64,
    /// S/N reaches the validation threshold and the area stays below the validation cap.
    pub valid: bool,
}

/// Thresholds applied when classifying bins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Validation {
    pub min_sn: f64,
    /// Exclusive upper bound on the bin area.
    pub max_area: f64,
}

impl Validation {
    #[inline]
    pub fn accepts(&self, sn: f64, area: usize) -> bool {
        sn >= self.min_sn && (area as f64) < self.max_area
    }
}

/// Compute [`BinStats`] for every bin of `tessellation`.
pub fn bin_statistics(
    pixels: &PixelSet,
    tessellation: &Tessellation,
    scales: &[f64],
    validation: Validation,
) -> Vec<BinStats> {
    assert_eq!(scales.len(), tessellation.bin_count());

    let members = bin_members(&tessellation.assignment, tessellation.bin_count());
    members
        .iter()
        .zip(&tessellation.generators)
        .zip(scales)
        .map(|((bin_pixels, &generator), &scale)| {
            let mut sums = BinSums::default();
            for &i in bin_pixels {
                sums.add(pixels.signal()[i], pixels.noise()[i]);
            }
            let area = sums.area;
            let sn = sums.sn();
            BinStats {
                generator,
                centroid: weighted_centroid(pixels, bin_pixels, pixels.signal()),
                signal: sums.signal / area as f64,
                noise: sums.noise_sq.sqrt() / area as f64,
                sn,
                area,
                scale,
                valid: validation.accepts(sn, area),
            }
        })
        .collect()
}

/// Index of the bin with the highest S/N. Ties go to the lowest index.
pub fn best_bin(stats: &[BinStats]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, bin) in stats.iter().enumerate() {
        if best.map_or(true, |b| bin.sn > stats[b].sn) {
            best = Some(i);
        }
    }
    best
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Spread of the S/N over valid multi-pixel bins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnStatistics {
    pub mean_sn: f64,
    /// Population standard deviation of `(sn - target) / target`.
    pub scatter_about_target: f64,
    /// Population standard deviation of `(sn - mean) / mean`.
    pub scatter_about_mean: f64,
}

/// Summary of how well the binning went.
///
/// Bins of area 1 are pixels that met the target on their own; they are
/// counted as valid but not as binned.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Diagnostics {
    pub pixel_count: usize,
    pub bin_count: usize,
    pub valid_bins: usize,
    /// Fraction of pixels in bins of area > 1.
    pub binned_pixel_fraction: f64,
    /// Fraction of bins that are valid multi-pixel bins or single pixels.
    pub valid_bin_fraction: f64,
    /// None when no valid multi-pixel bin exists.
    pub sn_statistics: Option<SnStatistics>,
}

pub fn diagnostics(stats: &[BinStats], pixel_count: usize, target_sn: f64) -> Diagnostics {
    let binned_pixels: usize = stats.iter().filter(|b| b.area > 1).map(|b| b.area).sum();
    let singles = stats.iter().filter(|b| b.area == 1).count();
    let valid_multi: Vec<f64> = stats
        .iter()
        .filter(|b| b.valid && b.area > 1)
        .map(|b| b.sn)
        .collect();

    let sn_statistics = if valid_multi.is_empty() {
        None
    } else {
        let mean_sn = valid_multi.iter().sum::<f64>() / valid_multi.len() as f64;
        Some(SnStatistics {
            mean_sn,
            scatter_about_target: relative_std(&valid_multi, target_sn),
            scatter_about_mean: relative_std(&valid_multi, mean_sn),
        })
    };

    Diagnostics {
        pixel_count,
        bin_count: stats.len(),
        valid_bins: stats.iter().filter(|b| b.valid).count(),
        binned_pixel_fraction: binned_pixels as f64 / pixel_count as f64,
        valid_bin_fraction: (valid_multi.len() + singles) as f64 / stats.len() as f64,
        sn_statistics,
    }
}

/// Population standard deviation of `(v - reference) / reference`.
fn relative_std(values: &[f64], reference: f64) -> f64 {
    let n = values.len() as f64;
    let relative: Vec<f64> = values.iter().map(|v| (v - reference) / reference).collect();
    let mean = relative.iter().sum::<f64>() / n;
    let variance = relative.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
