//! Reassignment of pixels left over from accretion.

use glam::DVec2;

use crate::accretion::{Accretion, UNBINNED};
use crate::error::Warning;
use crate::pixels::PixelSet;
use crate::tessellation::{centroid, centroid_generators, Tessellation};

/// Result of [`reassign_bad_bins`].
#[derive(Debug, Clone)]
pub struct Repair {
    pub tessellation: Tessellation,
    /// Pixels that were moved from a discarded bin to an accepted one.
    pub reassigned: usize,
    pub warning: Option<Warning>,
}

/// Give every discarded pixel to the accepted bin with the nearest centroid.
///
/// Accepted bins are renumbered densely from 0 in order of their accretion id.
/// Generators of the returned tessellation are the unweighted centroids of
/// the repaired bins. If accretion accepted no bin at all, the trial bins are
/// kept as grown.
pub fn reassign_bad_bins(pixels: &PixelSet, accretion: &Accretion) -> Repair {
    let (labels, warning) = if accretion.accepted_bins == 0 {
        let warning = Warning::NoBinSurvivedAccretion {
            trial_bins: accretion.trial_bins,
        };
        tracing::warn!("{}", warning);
        (&accretion.trial_labels, Some(warning))
    } else {
        (&accretion.labels, None)
    };

    // Dense renumbering of surviving ids, UNBINNED stays out.
    let mut present = vec![false; accretion.trial_bins + 1];
    for &label in labels {
        present[label as usize] = true;
    }
    let mut dense_id = vec![u32::MAX; accretion.trial_bins + 1];
    let mut bin_count = 0usize;
    for (label, _) in present.iter().enumerate().skip(1).filter(|(_, &p)| p) {
        dense_id[label] = bin_count as u32;
        bin_count += 1;
    }

    let mut assignment: Vec<u32> = labels
        .iter()
        .map(|&label| {
            if label == UNBINNED {
                u32::MAX
            } else {
                dense_id[label as usize]
            }
        })
        .collect();

    let survivors: Vec<Vec<usize>> = {
        let mut members = vec![Vec::new(); bin_count];
        for (pixel, &bin) in assignment.iter().enumerate() {
            if bin != u32::MAX {
                members[bin as usize].push(pixel);
            }
        }
        members
    };
    let centroids: Vec<DVec2> = survivors.iter().map(|m| centroid(pixels, m)).collect();

    let mut reassigned = 0usize;
    for (pixel, bin) in assignment.iter_mut().enumerate() {
        if *bin == u32::MAX {
            *bin = nearest_centroid(&centroids, pixels.position(pixel));
            reassigned += 1;
        }
    }

    let generators = centroid_generators(pixels, &assignment, bin_count);

    tracing::info!(
        "{} initial bins, {} pixels reassigned",
        bin_count,
        reassigned
    );

    Repair {
        tessellation: Tessellation {
            assignment,
            generators,
        },
        reassigned,
        warning,
    }
}

/// Index of the centroid closest to `point`. Ties go to the lowest index.
fn nearest_centroid(centroids: &[DVec2], point: DVec2) -> u32 {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (bin, c) in centroids.iter().enumerate() {
        let dist = c.distance_squared(point);
        if dist < best_dist {
            best = bin;
            best_dist = dist;
        }
    }
    best as u32
}
