//! Pixel-to-bin assignment and the per-bin quantities derived from it.
//!
//! Bins never own their pixels. Membership is the `assignment` array
//! (pixel index -> bin id); everything else is recomputed from it.

use glam::DVec2;

use crate::pixels::PixelSet;

/// Dense 0-based bin assignment plus one generator point per bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Tessellation {
    /// Bin id for every pixel.
    pub assignment: Vec<u32>,
    /// Tessellation seed for every bin.
    pub generators: Vec<DVec2>,
}

impl Tessellation {
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.generators.len()
    }

    pub fn areas(&self) -> Vec<usize> {
        bin_areas(&self.assignment, self.bin_count())
    }

    pub fn members(&self) -> Vec<Vec<usize>> {
        bin_members(&self.assignment, self.bin_count())
    }
}

/// Running totals for one bin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BinSums {
    pub area: usize,
    pub signal: f64,
    pub noise_sq: f64,
}

impl BinSums {
    #[inline]
    pub fn add(&mut self, signal: f64, noise: f64) {
        self.area += 1;
        self.signal += signal;
        self.noise_sq += noise * noise;
    }

    /// Summed signal over quadrature-summed noise.
    #[inline]
    pub fn sn(&self) -> f64 {
        self.signal / self.noise_sq.sqrt()
    }
}

pub fn bin_areas(assignment: &[u32], bin_count: usize) -> Vec<usize> {
    let mut areas = vec![0usize; bin_count];
    for &bin in assignment {
        areas[bin as usize] += 1;
    }
    areas
}

/// Pixel indices of every bin, each list in ascending pixel order.
pub fn bin_members(assignment: &[u32], bin_count: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); bin_count];
    for (pixel, &bin) in assignment.iter().enumerate() {
        members[bin as usize].push(pixel);
    }
    members
}

pub fn bin_sums(pixels: &PixelSet, assignment: &[u32], bin_count: usize) -> Vec<BinSums> {
    let mut sums = vec![BinSums::default(); bin_count];
    let signal = pixels.signal();
    let noise = pixels.noise();
    for (pixel, &bin) in assignment.iter().enumerate() {
        sums[bin as usize].add(signal[pixel], noise[pixel]);
    }
    sums
}

/// Plain mean position of `members`.
pub fn centroid(pixels: &PixelSet, members: &[usize]) -> DVec2 {
    debug_assert!(!members.is_empty(), "centroid of an empty bin");
    let sum: DVec2 = members.iter().map(|&i| pixels.position(i)).sum();
    sum / members.len() as f64
}

/// Plain centroid of every bin of `assignment`.
pub fn centroid_generators(pixels: &PixelSet, assignment: &[u32], bin_count: usize) -> Vec<DVec2> {
    bin_members(assignment, bin_count)
        .iter()
        .map(|m| centroid(pixels, m))
        .collect()
}

/// Weighted mean position of `members`.
///
/// When the total weight is not positive, only the positively weighted
/// members are used; when none has positive weight, the plain mean is
/// returned.
pub fn weighted_centroid(pixels: &PixelSet, members: &[usize], weights: &[f64]) -> DVec2 {
    let mass: f64 = members.iter().map(|&i| weights[i]).sum();
    if mass > 0.0 {
        return weighted_mean(pixels, members.iter().copied(), weights, mass);
    }

    let positive = members.iter().copied().filter(|&i| weights[i] > 0.0);
    let positive_mass: f64 = positive.clone().map(|i| weights[i]).sum();
    if positive_mass > 0.0 {
        weighted_mean(pixels, positive, weights, positive_mass)
    } else {
        centroid(pixels, members)
    }
}

fn weighted_mean(
    pixels: &PixelSet,
    members: impl Iterator<Item = usize>,
    weights: &[f64],
    mass: f64,
) -> DVec2 {
    let sum: DVec2 = members.map(|i| pixels.position(i) * weights[i]).sum();
    sum / mass
}
