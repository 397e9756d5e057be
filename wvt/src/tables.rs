//! Output tables and bin maps.
//!
//! Records are plain serde-serializable rows; the ASCII writers produce
//! whitespace-separated tables with a `#` header line.

use std::io::{self, Write};

use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::pixels::PixelSet;
use crate::summary::{best_bin, BinStats};

/// Bin id written to bin maps where no (selected) bin covers the pixel.
pub const NO_BIN: i32 = -1;

/// Which bins end up in tables and maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputSelection {
    #[default]
    All,
    /// Only bins passing validation, and their pixels.
    ValidOnly,
}

impl OutputSelection {
    #[inline]
    fn includes(self, bin: &BinStats) -> bool {
        match self {
            OutputSelection::All => true,
            OutputSelection::ValidOnly => bin.valid,
        }
    }
}

/// One row of the per-pixel table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRecord {
    pub x: i32,
    pub y: i32,
    pub bin: u32,
    pub signal: f64,
    pub noise: f64,
    pub sn: f64,
    /// Distance to the centroid of the highest-S/N bin.
    pub distance: f64,
}

/// One row of the per-bin table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BinRecord {
    pub bin: u32,
    pub generator_x: f64,
    pub generator_y: f64,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub signal: f64,
    pub noise: f64,
    pub sn: f64,
    pub area: usize,
    pub scale: f64,
    /// Distance between this bin's centroid and the highest-S/N bin's centroid.
    pub distance: f64,
}

/// Per-pixel images of the final bins.
#[derive(Debug, Clone, PartialEq)]
pub struct BinMaps {
    /// Bin id, [`NO_BIN`] where no selected bin covers the pixel.
    pub bin: Buffer2<i32>,
    /// Mean bin signal.
    pub signal: Buffer2<f64>,
    pub noise: Buffer2<f64>,
    pub sn: Buffer2<f64>,
}

fn reference_point(stats: &[BinStats]) -> DVec2 {
    best_bin(stats).map_or(DVec2::ZERO, |b| stats[b].centroid)
}

pub fn pixel_records(
    pixels: &PixelSet,
    assignment: &[u32],
    stats: &[BinStats],
    selection: OutputSelection,
) -> Vec<PixelRecord> {
    let reference = reference_point(stats);
    assignment
        .iter()
        .enumerate()
        .filter(|(_, &bin)| selection.includes(&stats[bin as usize]))
        .map(|(i, &bin)| {
            let coord = pixels.coord(i);
            PixelRecord {
                x: coord.x,
                y: coord.y,
                bin,
                signal: pixels.signal()[i],
                noise: pixels.noise()[i],
                sn: pixels.pixel_sn(i),
                distance: pixels.position(i).distance(reference),
            }
        })
        .collect()
}

pub fn bin_records(stats: &[BinStats], selection: OutputSelection) -> Vec<BinRecord> {
    let reference = reference_point(stats);
    stats
        .iter()
        .enumerate()
        .filter(|(_, bin)| selection.includes(bin))
        .map(|(id, bin)| BinRecord {
            bin: id as u32,
            generator_x: bin.generator.x,
            generator_y: bin.generator.y,
            centroid_x: bin.centroid.x,
            centroid_y: bin.centroid.y,
            signal: bin.signal,
            noise: bin.noise,
            sn: bin.sn,
            area: bin.area,
            scale: bin.scale,
            distance: bin.centroid.distance(reference),
        })
        .collect()
}

/// Rasterise the bins onto a `width` × `height` grid.
///
/// Pixels whose coordinates fall outside the grid are skipped.
pub fn bin_maps(
    pixels: &PixelSet,
    assignment: &[u32],
    stats: &[BinStats],
    width: usize,
    height: usize,
    selection: OutputSelection,
) -> BinMaps {
    let mut maps = BinMaps {
        bin: Buffer2::new_filled(width, height, NO_BIN),
        signal: Buffer2::new_filled(width, height, 0.0),
        noise: Buffer2::new_filled(width, height, 0.0),
        sn: Buffer2::new_filled(width, height, 0.0),
    };

    for (i, &bin) in assignment.iter().enumerate() {
        let stat = &stats[bin as usize];
        if !selection.includes(stat) {
            continue;
        }
        let coord = pixels.coord(i);
        if coord.x < 0 || coord.y < 0 || coord.x as usize >= width || coord.y as usize >= height {
            continue;
        }
        let at = (coord.x as usize, coord.y as usize);
        maps.bin[at] = bin as i32;
        maps.signal[at] = stat.signal;
        maps.noise[at] = stat.noise;
        maps.sn[at] = stat.sn;
    }
    maps
}

// ============================================================================
// ASCII writers
// ============================================================================

pub fn write_pixel_table<W: Write>(out: &mut W, records: &[PixelRecord]) -> io::Result<()> {
    writeln!(
        out,
        "#{:>5} {:>6} {:>6} {:>16} {:>16} {:>16} {:>16}",
        "x", "y", "bin", "signal", "noise", "sn", "distance"
    )?;
    for r in records {
        writeln!(
            out,
            "{:>6} {:>6} {:>6} {:>16.6e} {:>16.6e} {:>16.6} {:>16.6}",
            r.x, r.y, r.bin, r.signal, r.noise, r.sn, r.distance
        )?;
    }
    Ok(())
}

pub fn write_bin_table<W: Write>(out: &mut W, records: &[BinRecord]) -> io::Result<()> {
    writeln!(
        out,
        "#{:>5} {:>16} {:>16} {:>16} {:>16} {:>16} {:>16} {:>16} {:>6} {:>16} {:>16}",
        "bin",
        "generator_x",
        "generator_y",
        "centroid_x",
        "centroid_y",
        "signal",
        "noise",
        "sn",
        "area",
        "scale",
        "distance"
    )?;
    for r in records {
        writeln!(
            out,
            "{:>6} {:>16.6} {:>16.6} {:>16.6} {:>16.6} {:>16.6e} {:>16.6e} {:>16.6} {:>6} {:>16.6} {:>16.6}",
            r.bin,
            r.generator_x,
            r.generator_y,
            r.centroid_x,
            r.centroid_y,
            r.signal,
            r.noise,
            r.sn,
            r.area,
            r.scale,
            r.distance
        )?;
    }
    Ok(())
}
