//! Configuration types for adaptive binning.
//!
//! [`Config`] is a flat struct; every field has a default, so a configuration
//! file only needs to name the values it changes. Fields resolved against the
//! image (`max_area`, `validation_area`, ...) are exposed through the
//! `effective_*` accessors.

use std::path::Path;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Iteration cap used when `max_iterations` is 0.
pub const DEFAULT_MAX_ITERATIONS: usize = 1000;

/// Default validation S/N as a fraction of the target.
pub const VALIDATION_SN_FRACTION: f64 = 0.8;

/// Default validation area as a multiple of the effective maximum bin area.
pub const VALIDATION_AREA_FACTOR: f64 = 1.2;

// ============================================================================
// Enums
// ============================================================================

/// How bin generators and scale lengths are derived during refinement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TessellationMode {
    /// Weighted Voronoi tessellation (Diehl & Statler). Each bin gets a scale
    /// length from its area-normalised S/N; generators are unweighted centroids.
    #[default]
    Weighted,
    /// Ordinary Voronoi tessellation (Gersho's conjecture, Cappellari & Copin).
    /// All scales are equal; generators are density²-weighted centroids.
    EqualScale,
}

/// What the noise input holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NoiseKind {
    /// Standard deviation per pixel.
    #[default]
    Sigma,
    /// Variance per pixel; square-rooted on load.
    Variance,
}

// ============================================================================
// Binning Configuration
// ============================================================================

/// Configuration for the binning pipeline.
///
/// # Example
///
/// ```rust,ignore
/// use wvt::Config;
///
/// let mut config = Config::new(20.0);
/// config.max_area = 400;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -- Targets --
    /// Target S/N per bin.
    pub target_sn: f64,
    /// Maximum pixels per bin. 0 = unbounded (number of pixels).
    pub max_area: usize,

    // -- Accretion --
    /// Grid spacing in coordinate units, used for the equivalent radius in roundness.
    pub pixel_size: f64,
    /// Coordinate of the first seed. None = pixel with maximum density.
    pub center: Option<DVec2>,
    /// Accretion stops once adding the candidate would push roundness above this.
    pub roundness_limit: f64,
    /// A bin that cannot grow further is kept when its S/N exceeds this fraction of the target.
    pub accept_fraction: f64,

    // -- Refinement --
    /// Iteration cap for the Lloyd refinement. 0 = [`DEFAULT_MAX_ITERATIONS`].
    pub max_iterations: usize,
    /// Weighted (WVT) or equal-scale (Gersho) tessellation.
    pub mode: TessellationMode,

    // -- Validation --
    /// Minimum S/N for a valid bin. None = 0.8 × target.
    pub validation_sn: Option<f64>,
    /// Bins must be strictly smaller than this to be valid. None = 1.2 × effective max area.
    pub validation_area: Option<f64>,

    // -- Input --
    /// Interpretation of the noise input.
    pub noise_kind: NoiseKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_sn: 10.0,
            max_area: 0,

            pixel_size: 1.0,
            center: None,
            roundness_limit: 1.0,
            accept_fraction: 0.8,

            max_iterations: 0,
            mode: TessellationMode::Weighted,

            validation_sn: None,
            validation_area: None,

            noise_kind: NoiseKind::Sigma,
        }
    }
}

impl Config {
    /// Default configuration with the given target S/N.
    pub fn new(target_sn: f64) -> Self {
        Self {
            target_sn,
            ..Self::default()
        }
    }

    /// Equal-scale (Gersho) tessellation with the given target S/N.
    pub fn equal_scale(target_sn: f64) -> Self {
        Self {
            target_sn,
            mode: TessellationMode::EqualScale,
            ..Self::default()
        }
    }

    /// Load a configuration from a `.yaml`/`.yml` or `.json` file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        common::serde::load(path)
    }

    /// Validate the configuration, panicking if invalid.
    pub fn validate(&self) {
        assert!(
            self.target_sn.is_finite() && self.target_sn > 0.0,
            "target_sn must be positive, got {}",
            self.target_sn
        );
        assert!(
            self.pixel_size.is_finite() && self.pixel_size > 0.0,
            "pixel_size must be positive, got {}",
            self.pixel_size
        );
        if let Some(center) = self.center {
            assert!(
                center.is_finite(),
                "center must be finite, got {}",
                center
            );
        }
        assert!(
            self.roundness_limit > 0.0,
            "roundness_limit must be positive, got {}",
            self.roundness_limit
        );
        assert!(
            self.accept_fraction > 0.0 && self.accept_fraction <= 1.0,
            "accept_fraction must be in (0, 1], got {}",
            self.accept_fraction
        );
        if let Some(sn) = self.validation_sn {
            assert!(sn >= 0.0, "validation_sn must be non-negative, got {}", sn);
        }
        if let Some(area) = self.validation_area {
            assert!(area > 0.0, "validation_area must be positive, got {}", area);
        }
    }

    /// Maximum bin area for an image of `pixel_count` selected pixels.
    pub fn effective_max_area(&self, pixel_count: usize) -> usize {
        if self.max_area == 0 {
            pixel_count.max(1)
        } else {
            self.max_area
        }
    }

    pub fn effective_max_iterations(&self) -> usize {
        if self.max_iterations == 0 {
            DEFAULT_MAX_ITERATIONS
        } else {
            self.max_iterations
        }
    }

    pub fn effective_validation_sn(&self) -> f64 {
        self.validation_sn
            .unwrap_or(VALIDATION_SN_FRACTION * self.target_sn)
    }

    pub fn effective_validation_area(&self, pixel_count: usize) -> f64 {
        self.validation_area
            .unwrap_or(VALIDATION_AREA_FACTOR * self.effective_max_area(pixel_count) as f64)
    }
}
