//! Error and warning types for binning.

use thiserror::Error;

/// Fatal input errors. Raised before any bin is built.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("Signal and noise inputs differ in shape: signal {signal:?}, noise {noise:?}")]
    InputShapeMismatch {
        signal: (usize, usize),
        noise: (usize, usize),
    },

    #[error("Invalid noise at pixel {index}: {value} (must be finite and non-negative)")]
    InvalidNoise { index: usize, value: f64 },

    #[error("Pixel ({x}, {y}) appears more than once")]
    DuplicatePixel { x: i32, y: i32 },

    #[error("No pixels selected for binning")]
    NoPixels,
}

/// Non-fatal conditions. Binning still produces a result.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Warning {
    #[error(
        "Not enough S/N in the whole set of pixels: {global_sn:.3} < target {target_sn:.3}; \
         many pixels may have noise but virtually no signal"
    )]
    InsufficientGlobalSn { global_sn: f64, target_sn: f64 },

    #[error(
        "All pixels have enough S/N (minimum {min_pixel_sn:.3} > target {target_sn:.3}); \
         binning is not needed"
    )]
    BinningNotNeeded { min_pixel_sn: f64, target_sn: f64 },

    #[error("No bin reached the acceptance S/N during accretion; kept {trial_bins} trial bins")]
    NoBinSurvivedAccretion { trial_bins: usize },

    #[error("Refinement stopped after {iterations} iterations without converging")]
    ConvergenceNotReached { iterations: usize },
}
