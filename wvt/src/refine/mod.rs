//! Modified Lloyd refinement of the initial tessellation.
//!
//! Each iteration:
//!
//! 1. Derives a distance weight per bin from its current statistics
//!    (area-normalised S/N in weighted mode, constant in equal-scale mode)
//! 2. Re-assigns every pixel to its weighted-nearest generator
//! 3. Refills bins left without pixels
//! 4. Moves generators to the bin centroids (plain in weighted mode,
//!    density²-weighted in equal-scale mode)
//! 5. Resplits bins enclosed by a single other bin
//!
//! Iteration stops when neither the generators nor the assignment change,
//! or when the iteration cap is reached. Both are valid end states; the
//! latter is reported as a warning.

mod degeneracy;
mod tessellate;


use strum_macros::Display;

use crate::config::{Config, TessellationMode};
use crate::error::Warning;
use crate::neighbors::NeighborGraph;
use crate::pixels::PixelSet;
use crate::tessellation::{
    bin_areas, bin_members, bin_sums, centroid, weighted_centroid, Tessellation,
};

pub use degeneracy::{fill_empty_bins, resplit_islands, sole_neighbors};
pub use tessellate::{bin_weights, nearest_generator, retessellate, scales};

/// Where the refiner is in its iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RefineState {
    /// No iteration run yet.
    Initializing,
    /// Between iterations, more to do.
    Retessellating,
    /// Between iterations, more to do, and the last iteration had to refill
    /// empty bins or resplit enclosed ones.
    Repairing,
    /// Fixed point reached.
    Converged,
    /// Iteration cap reached before the fixed point.
    MaxIterReached,
}

impl RefineState {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, RefineState::Converged | RefineState::MaxIterReached)
    }
}

/// What one iteration changed.
#[derive(Debug, Clone, Copy, PartialEq)]
struct StepReport {
    /// Sum of squared generator moves.
    displacement: f64,
    /// Whether any pixel changed bin.
    reassigned: bool,
    empty_filled: usize,
    islands_resplit: usize,
}

/// Final state of a refinement run.
#[derive(Debug, Clone)]
pub struct Refinement {
    pub tessellation: Tessellation,
    /// Scale length per bin for the final assignment.
    pub scales: Vec<f64>,
    pub iterations: usize,
    pub state: RefineState,
    /// Displacement of the last iteration.
    pub displacement: f64,
}

impl Refinement {
    #[inline]
    pub fn converged(&self) -> bool {
        self.state == RefineState::Converged
    }

    pub fn warning(&self) -> Option<Warning> {
        (self.state == RefineState::MaxIterReached).then_some(Warning::ConvergenceNotReached {
            iterations: self.iterations,
        })
    }
}

/// Iterative driver over a [`Tessellation`].
///
/// `step()` runs one iteration; a caller can stop between steps. `run()`
/// loops until a terminal state.
#[derive(Debug)]
pub struct Refiner<'a> {
    pixels: &'a PixelSet,
    graph: &'a NeighborGraph,
    mode: TessellationMode,
    min_weight: f64,
    max_iterations: usize,
    /// density², the equal-scale generator weights.
    density_sq: Vec<f64>,
    tessellation: Tessellation,
    iterations: usize,
    state: RefineState,
    displacement: f64,
}

impl<'a> Refiner<'a> {
    pub fn new(
        pixels: &'a PixelSet,
        graph: &'a NeighborGraph,
        config: &Config,
        tessellation: Tessellation,
    ) -> Self {
        assert_eq!(
            tessellation.assignment.len(),
            pixels.len(),
            "assignment must cover every pixel"
        );
        assert!(
            tessellation.bin_count() > 0,
            "refinement needs at least one bin"
        );

        let max_area = config.effective_max_area(pixels.len());
        Self {
            pixels,
            graph,
            mode: config.mode,
            min_weight: config.target_sn / max_area as f64,
            max_iterations: config.effective_max_iterations(),
            density_sq: pixels.density().iter().map(|d| d * d).collect(),
            tessellation,
            iterations: 0,
            state: RefineState::Initializing,
            displacement: 0.0,
        }
    }

    #[inline]
    pub fn state(&self) -> RefineState {
        self.state
    }

    #[inline]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    #[inline]
    pub fn tessellation(&self) -> &Tessellation {
        &self.tessellation
    }

    /// Current distance weights, derived from the current assignment.
    pub fn weights(&self) -> Vec<f64> {
        let sums = bin_sums(
            self.pixels,
            &self.tessellation.assignment,
            self.tessellation.bin_count(),
        );
        bin_weights(&sums, self.mode, self.min_weight)
    }

    /// Run one iteration. Does nothing once a terminal state is reached.
    pub fn step(&mut self) -> RefineState {
        if self.state.is_terminal() {
            return self.state;
        }

        let report = self.iterate();
        self.iterations += 1;
        self.displacement = report.displacement;

        tracing::debug!(
            "Iteration {}: displacement {:.4e}, reassigned {}, empty {}, islands {}",
            self.iterations,
            report.displacement,
            report.reassigned,
            report.empty_filled,
            report.islands_resplit
        );

        self.state = if report.displacement == 0.0 && !report.reassigned {
            tracing::info!("Refinement converged after {} iterations", self.iterations);
            RefineState::Converged
        } else if self.iterations >= self.max_iterations {
            RefineState::MaxIterReached
        } else if report.empty_filled > 0 || report.islands_resplit > 0 {
            RefineState::Repairing
        } else {
            RefineState::Retessellating
        };
        self.state
    }

    /// Iterate to a terminal state.
    pub fn run(mut self) -> Refinement {
        while !self.step().is_terminal() {}
        self.finish()
    }

    /// Stop here and hand back the current tessellation.
    pub fn finish(self) -> Refinement {
        let scales = scales(&self.weights());
        let refinement = Refinement {
            tessellation: self.tessellation,
            scales,
            iterations: self.iterations,
            state: self.state,
            displacement: self.displacement,
        };
        if let Some(warning) = refinement.warning() {
            tracing::warn!("{}", warning);
        }
        refinement
    }

    fn iterate(&mut self) -> StepReport {
        let pixels = self.pixels;
        let bin_count = self.tessellation.bin_count();
        let previous = &self.tessellation;

        let weights = {
            let sums = bin_sums(pixels, &previous.assignment, bin_count);
            bin_weights(&sums, self.mode, self.min_weight)
        };

        let mut assignment = vec![0u32; pixels.len()];
        retessellate(pixels, &previous.generators, &weights, &mut assignment);

        let mut generators = previous.generators.clone();
        let mut areas = bin_areas(&assignment, bin_count);
        let mut empty_filled = fill_empty_bins(pixels, &mut assignment, &mut generators, &mut areas);

        let mut members = bin_members(&assignment, bin_count);
        for (generator, bin_pixels) in generators.iter_mut().zip(&members) {
            *generator = match self.mode {
                TessellationMode::Weighted => centroid(pixels, bin_pixels),
                TessellationMode::EqualScale => {
                    weighted_centroid(pixels, bin_pixels, &self.density_sq)
                }
            };
        }

        let islands_resplit = resplit_islands(
            pixels,
            self.graph,
            &mut assignment,
            &generators,
            &mut members,
        );
        if members.iter().any(|m| m.is_empty()) {
            let mut areas: Vec<usize> = members.iter().map(|m| m.len()).collect();
            empty_filled += fill_empty_bins(pixels, &mut assignment, &mut generators, &mut areas);
        }

        let displacement: f64 = generators
            .iter()
            .zip(&previous.generators)
            .map(|(new, old)| new.distance_squared(*old))
            .sum();
        let reassigned = assignment != previous.assignment;

        self.tessellation = Tessellation {
            assignment,
            generators,
        };

        StepReport {
            displacement,
            reassigned,
            empty_filled,
            islands_resplit,
        }
    }
}
