//! WVT - adaptive spatial binning of noisy 2D data.
//!
//! Partitions the pixels of a signal/noise image pair into contiguous bins
//! that each reach a target signal-to-noise ratio, using the weighted Voronoi
//! tessellation scheme of Diehl & Statler (2006), or the equal-scale variant
//! of Cappellari & Copin (2003).
//!
//! Pipeline:
//! - Neighbor graph over the selected pixels
//! - Greedy bin accretion from the densest (or a chosen) pixel
//! - Reassignment of pixels from bins that failed to reach the target
//! - Modified Lloyd refinement to a fixed point
//! - Per-bin statistics, validation and output tables
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use common::Buffer2;
//! use wvt::{Config, OutputSelection, VoronoiBinner};
//!
//! let binner = VoronoiBinner::from_config(Config::new(20.0));
//! let result = binner.bin_images(&signal, &noise)?;
//!
//! println!("{} bins in {} iterations", result.bin_count(), result.iterations);
//! result.write_bin_table(&mut std::io::stdout(), OutputSelection::All)?;
//! ```

pub mod accretion;
mod binner;
pub mod config;
mod error;
pub mod neighbors;
pub mod pixels;
pub mod refine;
pub mod repair;
pub mod summary;
pub mod tables;
pub mod tessellation;

#[cfg(test)]
mod tests;

// ============================================================================
// Main API
// ============================================================================

pub use binner::{BinningResult, VoronoiBinner};
pub use config::{Config, NoiseKind, TessellationMode};
pub use error::{Error, Warning};
pub use pixels::PixelSet;

// ============================================================================
// Pipeline stages
// ============================================================================

pub use accretion::{accrete, Accretion, BinAccumulator};
pub use neighbors::NeighborGraph;
pub use refine::{RefineState, Refinement, Refiner};
pub use repair::{reassign_bad_bins, Repair};
pub use tessellation::Tessellation;

// ============================================================================
// Results
// ============================================================================

pub use summary::{BinStats, Diagnostics, SnStatistics};
pub use tables::{BinMaps, BinRecord, OutputSelection, PixelRecord, NO_BIN};
