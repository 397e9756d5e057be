//! Greedy bin accretion.
//!
//! Bins are grown one at a time from a seed pixel by adding the unassigned
//! neighbor closest to the running weighted centroid, until the bin reaches
//! the target S/N, hits the area cap, runs out of neighbors, or would become
//! too elongated.

use std::f64::consts::PI;

use glam::DVec2;

use crate::config::Config;
use crate::neighbors::NeighborGraph;
use crate::pixels::PixelSet;

/// Label for pixels not in any accepted bin.
pub const UNBINNED: u32 = 0;

// ============================================================================
// Running bin accumulator
// ============================================================================

/// Incrementally maintained statistics of the bin being grown.
#[derive(Debug, Clone)]
pub struct BinAccumulator {
    members: Vec<usize>,
    signal: f64,
    noise_sq: f64,
    /// Sum of member positions, for the unweighted mean used by roundness.
    position_sum: DVec2,
    /// density²-weighted running centroid. The seed only fixes the starting
    /// point; its own weight is never added.
    centroid: DVec2,
    mass: f64,
    /// S/N reported while the bin holds only its seed.
    seed_sn: f64,
}

impl BinAccumulator {
    pub fn new(pixels: &PixelSet, seed: usize) -> Self {
        let position = pixels.position(seed);
        let noise = pixels.noise()[seed];
        Self {
            members: vec![seed],
            signal: pixels.signal()[seed],
            noise_sq: noise * noise,
            position_sum: position,
            centroid: position,
            mass: 0.0,
            seed_sn: pixels.pixel_sn(seed),
        }
    }

    /// Override the S/N of the single-pixel bin, e.g. with the seed's density.
    pub fn with_seed_sn(mut self, sn: f64) -> Self {
        self.seed_sn = sn;
        self
    }

    #[inline]
    pub fn area(&self) -> usize {
        self.members.len()
    }

    #[inline]
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    #[inline]
    pub fn sn(&self) -> f64 {
        if self.members.len() == 1 {
            self.seed_sn
        } else {
            self.signal / self.noise_sq.sqrt()
        }
    }

    #[inline]
    pub fn centroid(&self) -> DVec2 {
        self.centroid
    }

    /// S/N the bin would have with `pixel` added.
    pub fn sn_with(&self, pixels: &PixelSet, pixel: usize) -> f64 {
        let noise = pixels.noise()[pixel];
        (self.signal + pixels.signal()[pixel]) / (self.noise_sq + noise * noise).sqrt()
    }

    /// Roundness the bin would have with `pixel` added: maximum member
    /// distance from the plain mean over the equivalent circular radius, minus 1.
    pub fn roundness_with(&self, pixels: &PixelSet, pixel: usize, pixel_size: f64) -> f64 {
        let area = (self.area() + 1) as f64;
        let candidate = pixels.position(pixel);
        let mean = (self.position_sum + candidate) / area;

        let max_dist_sq = self
            .members
            .iter()
            .map(|&i| pixels.position(i).distance_squared(mean))
            .fold(candidate.distance_squared(mean), f64::max);

        let equivalent_radius = (area / PI).sqrt() * pixel_size;
        max_dist_sq.sqrt() / equivalent_radius - 1.0
    }

    pub fn push(&mut self, pixels: &PixelSet, pixel: usize) {
        let position = pixels.position(pixel);
        let noise = pixels.noise()[pixel];

        self.members.push(pixel);
        self.signal += pixels.signal()[pixel];
        self.noise_sq += noise * noise;
        self.position_sum += position;

        let weight = pixels.density()[pixel].powi(2);
        if weight > 0.0 {
            self.centroid = (position * weight + self.centroid * self.mass) / (self.mass + weight);
            self.mass += weight;
        }
    }
}

// ============================================================================
// Accretion pass
// ============================================================================

/// Outcome of the accretion pass.
#[derive(Debug, Clone)]
pub struct Accretion {
    /// Accepted bin id (1-based) per pixel, [`UNBINNED`] for discarded pixels.
    pub labels: Vec<u32>,
    /// Bin id each pixel was grown into, whether or not the bin was accepted.
    pub trial_labels: Vec<u32>,
    /// Number of bins grown.
    pub trial_bins: usize,
    /// Number of bins accepted.
    pub accepted_bins: usize,
    /// Pixel the first bin was seeded from.
    pub first_seed: usize,
    /// Pixels of the first bin in the order they were accreted.
    pub first_bin: Vec<usize>,
}

/// Grow bins over every pixel of `pixels`.
///
/// Sequential by construction: each seed depends on what earlier bins took.
pub fn accrete(pixels: &PixelSet, graph: &NeighborGraph, config: &Config) -> Accretion {
    assert_eq!(graph.len(), pixels.len(), "neighbor graph does not match pixels");

    let n = pixels.len();
    let target = config.target_sn;
    let max_area = config.effective_max_area(n);
    let accept_sn = config.accept_fraction * target;

    let first_seed = match config.center {
        Some(center) => pixels.nearest_pixel(center),
        None => pixels.densest_pixel(),
    };

    // Later seeds are the unlabeled pixels closest to the first seed; walk
    // all pixels in that order once.
    let origin = pixels.position(first_seed);
    let mut seed_order: Vec<usize> = (0..n).collect();
    seed_order.sort_by(|&a, &b| {
        let da = pixels.position(a).distance_squared(origin);
        let db = pixels.position(b).distance_squared(origin);
        da.total_cmp(&db).then(a.cmp(&b))
    });
    let mut seed_cursor = 0usize;

    let mut trial_labels = vec![UNBINNED; n];
    let mut in_frontier = vec![UNBINNED; n];
    let mut accepted = vec![false];
    let mut first_bin = Vec::new();
    let mut seed = first_seed;

    loop {
        let bin = accepted.len() as u32;
        let mut acc = BinAccumulator::new(pixels, seed);
        if bin == 1 {
            // the first bin is rated by the density it was seeded from
            acc = acc.with_seed_sn(pixels.density()[seed]);
        }
        trial_labels[seed] = bin;

        let mut frontier: Vec<usize> = Vec::new();
        push_frontier(graph, seed, bin, &trial_labels, &mut in_frontier, &mut frontier);

        let is_accepted = loop {
            let area = acc.area();
            let sn = acc.sn();
            let modified_target = target - sn * ((1.0 + 1.0 / area as f64).sqrt() - 1.0) / 2.0;
            if sn >= modified_target || area >= max_area {
                break true;
            }

            let Some(slot) = nearest_in_frontier(pixels, &frontier, acc.centroid()) else {
                break sn > accept_sn;
            };
            let candidate = frontier[slot];

            let roundness = acc.roundness_with(pixels, candidate, config.pixel_size);
            if roundness > config.roundness_limit {
                break acc.sn_with(pixels, candidate) > accept_sn;
            }

            frontier.swap_remove(slot);
            acc.push(pixels, candidate);
            trial_labels[candidate] = bin;
            push_frontier(graph, candidate, bin, &trial_labels, &mut in_frontier, &mut frontier);
        };

        tracing::trace!(
            "Bin {} closed: area {}, S/N {:.3}, accepted {}",
            bin,
            acc.area(),
            acc.sn(),
            is_accepted
        );
        accepted.push(is_accepted);
        if first_bin.is_empty() {
            first_bin = acc.members().to_vec();
        }

        while seed_cursor < n && trial_labels[seed_order[seed_cursor]] != UNBINNED {
            seed_cursor += 1;
        }
        if seed_cursor == n {
            break;
        }
        seed = seed_order[seed_cursor];
    }

    let labels = trial_labels
        .iter()
        .map(|&bin| if accepted[bin as usize] { bin } else { UNBINNED })
        .collect();
    let trial_bins = accepted.len() - 1;
    let accepted_bins = accepted.iter().filter(|&&a| a).count();

    tracing::info!(
        "Accretion grew {} bins, {} accepted",
        trial_bins,
        accepted_bins
    );

    Accretion {
        labels,
        trial_labels,
        trial_bins,
        accepted_bins,
        first_seed,
        first_bin,
    }
}

/// Queue the unlabeled neighbors of `pixel` not yet queued for `bin`.
fn push_frontier(
    graph: &NeighborGraph,
    pixel: usize,
    bin: u32,
    labels: &[u32],
    in_frontier: &mut [u32],
    frontier: &mut Vec<usize>,
) {
    for neighbor in graph.neighbors(pixel) {
        if labels[neighbor] == UNBINNED && in_frontier[neighbor] != bin {
            in_frontier[neighbor] = bin;
            frontier.push(neighbor);
        }
    }
}

/// Slot of the frontier pixel closest to `point`. Ties go to the lowest pixel index.
fn nearest_in_frontier(pixels: &PixelSet, frontier: &[usize], point: DVec2) -> Option<usize> {
    frontier
        .iter()
        .enumerate()
        .map(|(slot, &pixel)| (slot, pixel, pixels.position(pixel).distance_squared(point)))
        .min_by(|a, b| a.2.total_cmp(&b.2).then(a.1.cmp(&b.1)))
        .map(|(slot, _, _)| slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Buffer2;
    use glam::IVec2;

    use crate::config::NoiseKind;

    fn uniform(width: usize, height: usize, signal: f64, noise: f64) -> PixelSet {
        PixelSet::from_images(
            &Buffer2::new_filled(width, height, signal),
            &Buffer2::new_filled(width, height, noise),
            NoiseKind::Sigma,
        )
        .unwrap()
    }

    fn run(pixels: &PixelSet, config: &Config) -> Accretion {
        let graph = NeighborGraph::build(pixels.coords()).unwrap();
        accrete(pixels, &graph, config)
    }

    #[test]
    fn test_every_pixel_gets_a_trial_bin() {
        let pixels = uniform(10, 10, 1.0, 1.0);
        let result = run(&pixels, &Config::new(3.0));
        assert!(result.trial_labels.iter().all(|&b| b != UNBINNED));
        assert!(result.trial_labels.iter().all(|&b| b as usize <= result.trial_bins));
    }

    #[test]
    fn test_uniform_grid_bins_reach_near_target() {
        // S/N of a bin of area a is sqrt(a); the modified target lets bins
        // close slightly below 3, so accepted bins hold at least 5 pixels.
        let pixels = uniform(10, 10, 1.0, 1.0);
        let result = run(&pixels, &Config::new(3.0));

        let mut areas = vec![0usize; result.trial_bins + 1];
        for &b in &result.labels {
            areas[b as usize] += 1;
        }
        for (bin, &area) in areas.iter().enumerate().skip(1) {
            assert!(area == 0 || area >= 5, "bin {} has area {}", bin, area);
        }
        assert!(result.accepted_bins >= 8);
    }

    #[test]
    fn test_bins_are_connected() {
        let pixels = uniform(12, 9, 1.0, 1.0);
        let graph = NeighborGraph::build(pixels.coords()).unwrap();
        let result = accrete(&pixels, &graph, &Config::new(3.0));

        for bin in 1..=result.trial_bins as u32 {
            let members: Vec<usize> = (0..pixels.len())
                .filter(|&i| result.trial_labels[i] == bin)
                .collect();
            let mut seen = vec![false; pixels.len()];
            let mut stack = vec![members[0]];
            seen[members[0]] = true;
            let mut reached = 1;
            while let Some(p) = stack.pop() {
                for q in graph.neighbors(p) {
                    if !seen[q] && result.trial_labels[q] == bin {
                        seen[q] = true;
                        reached += 1;
                        stack.push(q);
                    }
                }
            }
            assert_eq!(reached, members.len(), "bin {} is not connected", bin);
        }
    }

    #[test]
    fn test_first_seed_is_densest_pixel() {
        let mut signal = Buffer2::new_filled(5, 5, 1.0);
        signal[(3, 1)] = 50.0;
        let pixels =
            PixelSet::from_images(&signal, &Buffer2::new_filled(5, 5, 1.0), NoiseKind::Sigma)
                .unwrap();
        let result = run(&pixels, &Config::new(10.0));

        assert_eq!(pixels.coord(result.first_seed), IVec2::new(3, 1));
        // Already above target on its own
        assert_eq!(result.first_bin, vec![result.first_seed]);
    }

    #[test]
    fn test_center_overrides_seed() {
        let pixels = uniform(10, 10, 1.0, 1.0);
        let config = Config {
            center: Some(DVec2::new(7.0, 2.0)),
            ..Config::new(3.0)
        };
        let result = run(&pixels, &config);

        assert_eq!(pixels.coord(result.first_seed), IVec2::new(7, 2));
        assert_eq!(result.first_bin[0], result.first_seed);
    }

    #[test]
    fn test_max_area_closes_bins() {
        let pixels = uniform(6, 6, 1.0, 1.0);
        let config = Config {
            max_area: 4,
            ..Config::new(100.0)
        };
        let result = run(&pixels, &config);

        let mut areas = vec![0usize; result.trial_bins + 1];
        for &b in &result.trial_labels {
            areas[b as usize] += 1;
        }
        assert!(areas.iter().skip(1).all(|&a| a <= 4));
    }

    #[test]
    fn test_isolated_low_sn_pixel_is_discarded() {
        let pixels = PixelSet::from_columns(vec![IVec2::new(0, 0)], vec![1.0], vec![1.0]).unwrap();
        let result = run(&pixels, &Config::new(5.0));

        assert_eq!(result.trial_bins, 1);
        assert_eq!(result.accepted_bins, 0);
        assert_eq!(result.labels, vec![UNBINNED]);
        assert_eq!(result.trial_labels, vec![1]);
    }

    #[test]
    fn test_accumulator_tracks_weighted_centroid() {
        let coords = vec![IVec2::new(0, 0), IVec2::new(1, 0), IVec2::new(2, 0)];
        let pixels =
            PixelSet::from_columns(coords, vec![1.0, 3.0, 1.0], vec![1.0; 3]).unwrap();
        let mut acc = BinAccumulator::new(&pixels, 0);
        assert_eq!(acc.centroid(), DVec2::ZERO);

        // the seed carries no weight, so the first pixel added takes over
        acc.push(&pixels, 1);
        assert_eq!(acc.centroid(), DVec2::new(1.0, 0.0));
        assert_eq!(acc.area(), 2);
        assert!((acc.sn() - 4.0 / 2f64.sqrt()).abs() < 1e-12);

        // weights are density²: 9 and 1
        acc.push(&pixels, 2);
        assert!((acc.centroid().x - 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_first_accretions_follow_unweighted_seed() {
        let pixels = uniform(5, 5, 1.0, 1.0);
        let config = Config {
            center: Some(DVec2::ZERO),
            ..Config::new(3.0)
        };
        let result = run(&pixels, &config);

        let order: Vec<IVec2> = result.first_bin.iter().map(|&i| pixels.coord(i)).collect();
        // after (1, 0) joins, the centroid sits on it and (2, 0) beats (0, 1)
        assert_eq!(&order[..3], &[IVec2::new(0, 0), IVec2::new(1, 0), IVec2::new(2, 0)]);
    }

    #[test]
    fn test_seed_density_rates_first_bin() {
        let mut density = vec![1.0; 16];
        density[5] = 50.0;
        let pixels = uniform(4, 4, 1.0, 1.0).with_density(density);
        let result = run(&pixels, &Config::new(3.0));

        assert_eq!(result.first_seed, 5);
        // closed on the seed density alone, although its own S/N is 1
        assert_eq!(result.first_bin, vec![5]);
        assert_eq!(result.labels[5], 1);

        let plain = BinAccumulator::new(&pixels, 5);
        assert_eq!(plain.sn(), 1.0);
        assert_eq!(plain.with_seed_sn(50.0).sn(), 50.0);
    }

    #[test]
    fn test_roundness_stop_accepts_on_candidate_sn() {
        let row = |n: i32| {
            let coords = (0..n).map(|x| IVec2::new(x, 0)).collect();
            PixelSet::from_columns(coords, vec![1.0; n as usize], vec![1.0; n as usize]).unwrap()
        };
        let pixels = row(10);
        let config = Config {
            center: Some(DVec2::ZERO),
            accept_fraction: 0.85,
            ..Config::new(3.0)
        };
        let result = run(&pixels, &config);

        // a 7th pixel in line is too elongated; sqrt(7) clears 0.85 × 3 but sqrt(6) does not
        assert_eq!(result.labels, vec![1, 1, 1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(result.trial_labels, vec![1, 1, 1, 1, 1, 1, 2, 2, 2, 2]);
        assert_eq!(result.accepted_bins, 1);

        let relaxed = Config {
            roundness_limit: 10.0,
            ..config
        };
        let result = run(&pixels, &relaxed);
        assert_eq!(result.labels, vec![1, 1, 1, 1, 1, 1, 1, 1, 1, 0]);
    }

    #[test]
    fn test_roundness_of_line_exceeds_limit() {
        let coords: Vec<IVec2> = (0..6).map(|x| IVec2::new(x, 0)).collect();
        let pixels = PixelSet::from_columns(coords, vec![1.0; 6], vec![1.0; 6]).unwrap();
        let mut acc = BinAccumulator::new(&pixels, 0);
        for i in 1..5 {
            acc.push(&pixels, i);
        }
        // 6 pixels in a line: max distance 2.5, radius sqrt(6/pi)
        let expected = 2.5 / (6.0 / PI).sqrt() - 1.0;
        assert!((acc.roundness_with(&pixels, 5, 1.0) - expected).abs() < 1e-12);
        assert!(acc.roundness_with(&pixels, 5, 1.0) > 0.8);
    }
}
