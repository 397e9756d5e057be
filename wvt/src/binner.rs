//! End-to-end binning pipeline.

use std::io::Write;

use common::Buffer2;

use crate::accretion::accrete;
use crate::config::Config;
use crate::error::{Error, Warning};
use crate::neighbors::NeighborGraph;
use crate::pixels::PixelSet;
use crate::refine::{RefineState, Refiner};
use crate::repair::reassign_bad_bins;
use crate::summary::{bin_statistics, diagnostics, BinStats, Diagnostics, Validation};
use crate::tables::{self, BinMaps, BinRecord, OutputSelection, PixelRecord};

/// Adaptive S/N binner.
///
/// ```rust,ignore
/// use wvt::{Config, VoronoiBinner};
///
/// let binner = VoronoiBinner::from_config(Config::new(20.0));
/// let result = binner.bin_images(&signal, &noise)?;
/// println!("{} bins", result.bin_count());
/// ```
#[derive(Debug, Default)]
pub struct VoronoiBinner {
    config: Config,
}

impl VoronoiBinner {
    /// Binner with the default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bin two aligned images. Pixels with zero or non-finite signal are left out.
    pub fn bin_images(
        &self,
        signal: &Buffer2<f64>,
        noise: &Buffer2<f64>,
    ) -> Result<BinningResult, Error> {
        let pixels = PixelSet::from_images(signal, noise, self.config.noise_kind)?;
        tracing::debug!(
            "Selected {} of {} pixels",
            pixels.len(),
            signal.len()
        );
        self.bin_pixels(pixels)
    }

    /// Bin an already selected pixel set.
    pub fn bin_pixels(&self, pixels: PixelSet) -> Result<BinningResult, Error> {
        self.config.validate();
        let config = &self.config;
        let mut warnings = Vec::new();

        // Step 1: Check that binning makes sense at all
        let global_sn = pixels.global_sn();
        if global_sn < config.target_sn {
            warnings.push(Warning::InsufficientGlobalSn {
                global_sn,
                target_sn: config.target_sn,
            });
        }
        let min_pixel_sn = pixels.min_pixel_sn();
        if min_pixel_sn > config.target_sn {
            warnings.push(Warning::BinningNotNeeded {
                min_pixel_sn,
                target_sn: config.target_sn,
            });
        }
        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        // Step 2: Neighbor graph
        let graph = NeighborGraph::build(pixels.coords())?;

        // Step 3: Accretion and reassignment of bad bins
        let accretion = accrete(&pixels, &graph, config);
        let repair = reassign_bad_bins(&pixels, &accretion);
        let reassigned_pixels = repair.reassigned;
        warnings.extend(repair.warning);

        // Step 4: Lloyd refinement
        tracing::info!(
            "Refining {} bins ({} mode)",
            repair.tessellation.bin_count(),
            config.mode
        );
        let refinement = Refiner::new(&pixels, &graph, config, repair.tessellation).run();
        warnings.extend(refinement.warning());

        // Step 5: Final statistics
        let validation = Validation {
            min_sn: config.effective_validation_sn(),
            max_area: config.effective_validation_area(pixels.len()),
        };
        let bins = bin_statistics(
            &pixels,
            &refinement.tessellation,
            &refinement.scales,
            validation,
        );
        let diagnostics = diagnostics(&bins, pixels.len(), config.target_sn);

        tracing::info!(
            "{} bins, {} valid, {:.1}% of pixels binned",
            diagnostics.bin_count,
            diagnostics.valid_bins,
            100.0 * diagnostics.binned_pixel_fraction
        );
        if let Some(sn) = diagnostics.sn_statistics {
            tracing::info!(
                "Mean bin S/N {:.3}, scatter {:.1}% about target, {:.1}% about mean",
                sn.mean_sn,
                100.0 * sn.scatter_about_target,
                100.0 * sn.scatter_about_mean
            );
        }

        Ok(BinningResult {
            assignment: refinement.tessellation.assignment,
            pixels,
            bins,
            diagnostics,
            trial_bins: accretion.trial_bins,
            reassigned_pixels,
            first_bin: accretion.first_bin,
            iterations: refinement.iterations,
            state: refinement.state,
            warnings,
        })
    }
}

/// Outcome of a binning run.
#[derive(Debug, Clone)]
pub struct BinningResult {
    /// The binned pixels, in assignment order.
    pub pixels: PixelSet,
    /// Final 0-based bin id per pixel.
    pub assignment: Vec<u32>,
    /// Statistics per bin, indexed by bin id.
    pub bins: Vec<BinStats>,
    pub diagnostics: Diagnostics,
    /// Bins grown during accretion, accepted or not.
    pub trial_bins: usize,
    /// Pixels moved out of discarded bins.
    pub reassigned_pixels: usize,
    /// Pixels of the first accreted bin in accretion order.
    pub first_bin: Vec<usize>,
    /// Refinement iterations run.
    pub iterations: usize,
    /// Converged or MaxIterReached.
    pub state: RefineState,
    pub warnings: Vec<Warning>,
}

impl BinningResult {
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    #[inline]
    pub fn converged(&self) -> bool {
        self.state == RefineState::Converged
    }

    pub fn pixel_table(&self, selection: OutputSelection) -> Vec<PixelRecord> {
        tables::pixel_records(&self.pixels, &self.assignment, &self.bins, selection)
    }

    pub fn bin_table(&self, selection: OutputSelection) -> Vec<BinRecord> {
        tables::bin_records(&self.bins, selection)
    }

    pub fn bin_maps(&self, width: usize, height: usize, selection: OutputSelection) -> BinMaps {
        tables::bin_maps(
            &self.pixels,
            &self.assignment,
            &self.bins,
            width,
            height,
            selection,
        )
    }

    pub fn write_pixel_table<W: Write>(
        &self,
        out: &mut W,
        selection: OutputSelection,
    ) -> std::io::Result<()> {
        tables::write_pixel_table(out, &self.pixel_table(selection))
    }

    pub fn write_bin_table<W: Write>(
        &self,
        out: &mut W,
        selection: OutputSelection,
    ) -> std::io::Result<()> {
        tables::write_bin_table(out, &self.bin_table(selection))
    }
}
