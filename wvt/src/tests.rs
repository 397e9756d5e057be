//! End-to-end binning tests.

use common::Buffer2;
use glam::{DVec2, IVec2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::*;

fn flat(width: usize, height: usize, value: f64) -> Buffer2<f64> {
    Buffer2::new_filled(width, height, value)
}

fn bin(config: Config, signal: &Buffer2<f64>, noise: &Buffer2<f64>) -> BinningResult {
    VoronoiBinner::from_config(config)
        .bin_images(signal, noise)
        .unwrap()
}

fn assert_complete_partition(result: &BinningResult) {
    assert_eq!(result.assignment.len(), result.pixels.len());
    assert!(result
        .assignment
        .iter()
        .all(|&b| (b as usize) < result.bin_count()));
    assert!(
        result.bins.iter().all(|b| b.area >= 1),
        "empty bin after binning"
    );
    let total: usize = result.bins.iter().map(|b| b.area).sum();
    assert_eq!(total, result.pixels.len());
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_uniform_grid_partition() {
    common::log_setup::init_test_tracing();
    let result = bin(Config::new(3.0), &flat(10, 10, 1.0), &flat(10, 10, 1.0));

    assert!(result.converged());
    assert!(result.warnings.is_empty(), "{:?}", result.warnings);
    assert_complete_partition(&result);
    for (id, stats) in result.bins.iter().enumerate() {
        assert!(stats.area >= 5, "bin {} has area {}", id, stats.area);
        assert!((stats.sn - (stats.area as f64).sqrt()).abs() < 1e-9);
    }
    assert_eq!(result.diagnostics.binned_pixel_fraction, 1.0);
}

#[test]
fn test_zero_noise_is_replaced_not_rejected() {
    let result = bin(Config::new(3.0), &flat(4, 4, 1.0), &flat(4, 4, 0.0));

    // every pixel is far above target on its own
    assert_eq!(result.bin_count(), 16);
    assert!(result.bins.iter().all(|b| b.area == 1));
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::BinningNotNeeded { .. })));
    assert!(result.converged());
}

#[test]
fn test_single_pixel_image() {
    let result = bin(Config::new(1.0), &flat(1, 1, 5.0), &flat(1, 1, 1.0));

    assert_eq!(result.bin_count(), 1);
    assert_eq!(result.assignment, vec![0]);
    assert_eq!(result.bins[0].area, 1);
    assert_eq!(result.bins[0].sn, 5.0);
    assert_eq!(result.bins[0].centroid, DVec2::ZERO);
    assert!(result.converged());
}

#[test]
fn test_explicit_seed_starts_first_bin() {
    let config = Config {
        center: Some(DVec2::new(7.0, 2.0)),
        ..Config::new(3.0)
    };
    let result = bin(config, &flat(10, 10, 1.0), &flat(10, 10, 1.0));

    assert_eq!(result.pixels.coord(result.first_bin[0]), IVec2::new(7, 2));
    assert!(result.first_bin.len() > 1);
}

#[test]
fn test_isolated_low_sn_pixel_becomes_singleton() {
    // with the default area cap a lone pixel is accepted by size alone
    let config = Config {
        max_area: 4,
        ..Config::new(5.0)
    };
    let result = bin(config, &flat(1, 1, 1.0), &flat(1, 1, 1.0));

    assert_eq!(result.bin_count(), 1);
    assert_eq!(result.bins[0].area, 1);
    assert!(result
        .warnings
        .contains(&Warning::NoBinSurvivedAccretion { trial_bins: 1 }));
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::InsufficientGlobalSn { .. })));
}

#[test]
fn test_isolated_pixel_is_reassigned() {
    let mut coords = Vec::new();
    for y in 0..6 {
        for x in 0..6 {
            coords.push(IVec2::new(x, y));
        }
    }
    coords.push(IVec2::new(10, 10));
    let mut signal = vec![1.0; 36];
    signal.push(0.5);
    let pixels = PixelSet::from_columns(coords, signal, vec![1.0; 37]).unwrap();

    let result = VoronoiBinner::from_config(Config::new(3.0))
        .bin_pixels(pixels)
        .unwrap();

    assert!(result.reassigned_pixels >= 1);
    assert_complete_partition(&result);
    assert!(!result
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::NoBinSurvivedAccretion { .. })));
}

// ============================================================================
// Errors and warnings
// ============================================================================

#[test]
fn test_shape_mismatch() {
    let err = VoronoiBinner::from_config(Config::new(3.0))
        .bin_images(&flat(5, 5, 1.0), &flat(5, 4, 1.0))
        .unwrap_err();
    assert!(matches!(err, Error::InputShapeMismatch { .. }));
}

#[test]
fn test_negative_noise() {
    let mut noise = flat(3, 3, 1.0);
    noise[(2, 1)] = -1.0;
    let err = VoronoiBinner::from_config(Config::new(3.0))
        .bin_images(&flat(3, 3, 1.0), &noise)
        .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidNoise {
            index: 5,
            value: -1.0
        }
    );
}

#[test]
fn test_duplicate_pixels() {
    let coords = vec![IVec2::new(0, 0), IVec2::new(1, 0), IVec2::new(0, 0)];
    let pixels = PixelSet::from_columns(coords, vec![1.0; 3], vec![1.0; 3]).unwrap();
    let err = VoronoiBinner::new().bin_pixels(pixels).unwrap_err();
    assert_eq!(err, Error::DuplicatePixel { x: 0, y: 0 });
}

#[test]
fn test_iteration_cap_keeps_result() {
    let config = Config {
        max_iterations: 1,
        ..Config::new(3.0)
    };
    let result = bin(config, &flat(10, 10, 1.0), &flat(10, 10, 1.0));

    assert_eq!(result.iterations, 1);
    assert_eq!(result.state, RefineState::MaxIterReached);
    assert_eq!(
        result.warnings,
        vec![Warning::ConvergenceNotReached { iterations: 1 }]
    );
    assert_complete_partition(&result);
}

#[test]
fn test_variance_noise_input() {
    let config = Config {
        noise_kind: NoiseKind::Variance,
        ..Config::new(1.0)
    };
    let result = bin(config, &flat(1, 1, 4.0), &flat(1, 1, 4.0));
    assert_eq!(result.bins[0].sn, 2.0);
}

// ============================================================================
// Outputs
// ============================================================================

#[test]
fn test_tables_and_maps_cover_selected_bins() {
    let signal = Buffer2::from_fn(12, 10, |x, y| 1.0 + (x + y) as f64 * 0.2);
    let config = Config {
        validation_sn: Some(4.5),
        ..Config::new(4.0)
    };
    let result = bin(config, &signal, &flat(12, 10, 1.0));

    let pixels = result.pixel_table(OutputSelection::All);
    assert_eq!(pixels.len(), 120);
    assert_eq!(result.bin_table(OutputSelection::All).len(), result.bin_count());

    let valid_bins = result.bin_table(OutputSelection::ValidOnly);
    let valid_area: usize = valid_bins.iter().map(|b| b.area).sum();
    assert_eq!(valid_bins.len(), result.diagnostics.valid_bins);
    assert_eq!(
        result.pixel_table(OutputSelection::ValidOnly).len(),
        valid_area
    );

    let maps = result.bin_maps(12, 10, OutputSelection::All);
    assert!(maps.bin.iter().all(|&b| b >= 0));
    for record in &pixels {
        let at = (record.x as usize, record.y as usize);
        assert_eq!(maps.bin[at], record.bin as i32);
        assert_eq!(maps.sn[at], result.bins[record.bin as usize].sn);
    }

    let mut out = Vec::new();
    result
        .write_bin_table(&mut out, OutputSelection::All)
        .unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), result.bin_count() + 1);
}

#[test]
fn test_masked_pixels_stay_out() {
    // zero signal marks pixels outside the mask
    let signal = Buffer2::from_fn(8, 8, |x, y| if (x + y) % 5 == 0 { 0.0 } else { 1.0 });
    let result = bin(Config::new(3.0), &signal, &flat(8, 8, 1.0));

    let maps = result.bin_maps(8, 8, OutputSelection::All);
    for (x, y, &s) in signal.enumerate() {
        assert_eq!(s == 0.0, maps.bin[(x, y)] == NO_BIN, "pixel ({}, {})", x, y);
    }
    assert_complete_partition(&result);
}

// ============================================================================
// Randomised invariants
// ============================================================================

#[test]
fn test_random_fields_produce_complete_partitions() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let width = rng.random_range(6..20);
        let height = rng.random_range(6..20);
        let signal = Buffer2::from_fn(width, height, |_, _| {
            if rng.random_bool(0.1) {
                0.0
            } else {
                rng.random_range(-1.0..4.0)
            }
        });
        let noise = Buffer2::from_fn(width, height, |_, _| rng.random_range(0.2..2.0));
        let config = Config {
            mode: if seed % 2 == 0 {
                TessellationMode::Weighted
            } else {
                TessellationMode::EqualScale
            },
            max_iterations: 60,
            ..Config::new(rng.random_range(3.0..10.0))
        };

        let result = bin(config, &signal, &noise);

        assert_complete_partition(&result);
        assert!(result.iterations <= 60, "seed {}", seed);
        let capped = result
            .warnings
            .iter()
            .any(|w| matches!(w, Warning::ConvergenceNotReached { .. }));
        assert_eq!(result.converged(), !capped, "seed {}", seed);
    }
}
