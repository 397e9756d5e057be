//! Repairs for empty bins and enclosed (island) bins.

use glam::DVec2;

use crate::neighbors::NeighborGraph;
use crate::pixels::PixelSet;

/// Give every empty bin the pixel closest to its generator, taken from a bin
/// that can spare one (area > 1). The generator moves onto that pixel.
///
/// Empty bins are handled in ascending id order; ties between donor pixels go
/// to the lowest pixel index. Returns the number of bins refilled.
pub fn fill_empty_bins(
    pixels: &PixelSet,
    assignment: &mut [u32],
    generators: &mut [DVec2],
    areas: &mut [usize],
) -> usize {
    let mut filled = 0;
    for empty in 0..areas.len() {
        if areas[empty] != 0 {
            continue;
        }

        let target = generators[empty];
        let mut donor: Option<(usize, f64)> = None;
        for (pixel, &bin) in assignment.iter().enumerate() {
            if areas[bin as usize] <= 1 {
                continue;
            }
            let dist = pixels.position(pixel).distance_squared(target);
            if donor.map_or(true, |(_, best)| dist < best) {
                donor = Some((pixel, dist));
            }
        }

        let Some((pixel, _)) = donor else {
            debug_assert!(false, "no donor pixel for empty bin {}", empty);
            continue;
        };

        areas[assignment[pixel] as usize] -= 1;
        assignment[pixel] = empty as u32;
        areas[empty] = 1;
        generators[empty] = pixels.position(pixel);
        filled += 1;
        tracing::trace!("Refilled empty bin {} with pixel {}", empty, pixel);
    }
    filled
}

/// Distinct neighboring bins seen so far, up to the point where the answer
/// to "exactly one?" is settled.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Adjacency {
    None,
    One(u32),
    Many,
}

impl Adjacency {
    #[inline]
    fn add(self, bin: u32) -> Self {
        match self {
            Adjacency::None => Adjacency::One(bin),
            Adjacency::One(b) if b == bin => self,
            _ => Adjacency::Many,
        }
    }
}

/// For each bin, its single neighboring bin if it borders exactly one.
pub fn sole_neighbors(graph: &NeighborGraph, assignment: &[u32], bin_count: usize) -> Vec<Option<u32>> {
    let mut adjacency = vec![Adjacency::None; bin_count];
    for (pixel, &bin) in assignment.iter().enumerate() {
        for neighbor in graph.neighbors(pixel) {
            let other = assignment[neighbor];
            if other != bin {
                let entry = &mut adjacency[bin as usize];
                *entry = entry.add(other);
            }
        }
    }
    adjacency
        .into_iter()
        .map(|a| match a {
            Adjacency::One(b) => Some(b),
            _ => None,
        })
        .collect()
}

/// Pool each enclosed bin with the bin around it and split the pool again
/// by plain distance to the two generators (ties stay with the enclosed bin).
///
/// `members` is kept in sync with `assignment`. Returns the number of bins
/// resplit.
pub fn resplit_islands(
    pixels: &PixelSet,
    graph: &NeighborGraph,
    assignment: &mut [u32],
    generators: &[DVec2],
    members: &mut [Vec<usize>],
) -> usize {
    let sole = sole_neighbors(graph, assignment, generators.len());

    let mut resplit = 0;
    for (island, outer) in sole.into_iter().enumerate() {
        let Some(outer) = outer else {
            continue;
        };
        let outer = outer as usize;
        let island_gen = generators[island];
        let outer_gen = generators[outer];

        let mut pool = std::mem::take(&mut members[island]);
        pool.append(&mut members[outer]);
        for pixel in pool {
            let p = pixels.position(pixel);
            let bin = if p.distance_squared(island_gen) <= p.distance_squared(outer_gen) {
                island
            } else {
                outer
            };
            assignment[pixel] = bin as u32;
            members[bin].push(pixel);
        }
        resplit += 1;
        tracing::trace!("Resplit island bin {} with bin {}", island, outer);
    }
    resplit
}
