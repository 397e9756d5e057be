//! Selected input pixels with their signal, noise and density.

use common::Buffer2;
use glam::{DVec2, IVec2};

use crate::config::NoiseKind;
use crate::error::Error;

/// Factor applied to the smallest positive noise to replace zero noise.
const ZERO_NOISE_FACTOR: f64 = 1e-9;

/// The pixels taking part in binning, stored as parallel columns.
///
/// Pixels are addressed by a dense index `0..len()` assigned at load time
/// (row-major order for image input). Immutable once built.
#[derive(Debug, Clone)]
pub struct PixelSet {
    coords: Vec<IVec2>,
    signal: Vec<f64>,
    noise: Vec<f64>,
    density: Vec<f64>,
}

impl PixelSet {
    /// Select pixels with finite, nonzero signal and finite noise from two aligned images.
    pub fn from_images(
        signal: &Buffer2<f64>,
        noise: &Buffer2<f64>,
        noise_kind: NoiseKind,
    ) -> Result<Self, Error> {
        Self::from_images_where(signal, noise, noise_kind, |s, n| {
            s != 0.0 && s.is_finite() && n.is_finite()
        })
    }

    /// Select pixels for which `select(signal, noise)` holds.
    ///
    /// `noise` is interpreted according to `noise_kind` before `select` sees it.
    pub fn from_images_where<F>(
        signal: &Buffer2<f64>,
        noise: &Buffer2<f64>,
        noise_kind: NoiseKind,
        select: F,
    ) -> Result<Self, Error>
    where
        F: Fn(f64, f64) -> bool,
    {
        if signal.dimensions() != noise.dimensions() {
            return Err(Error::InputShapeMismatch {
                signal: signal.dimensions(),
                noise: noise.dimensions(),
            });
        }

        let mut coords = Vec::new();
        let mut signal_col = Vec::new();
        let mut noise_col = Vec::new();
        for ((x, y, &s), &n) in signal.enumerate().zip(noise.iter()) {
            let n = match noise_kind {
                NoiseKind::Sigma => n,
                NoiseKind::Variance if n >= 0.0 => n.sqrt(),
                NoiseKind::Variance => n,
            };
            if select(s, n) {
                coords.push(IVec2::new(x as i32, y as i32));
                signal_col.push(s);
                noise_col.push(n);
            }
        }

        Self::from_columns(coords, signal_col, noise_col)
    }

    /// Build from pre-extracted columns. `noise` is a standard deviation.
    ///
    /// Coordinates may describe any mask shape; they are not required to be
    /// non-negative or to fill a rectangle.
    pub fn from_columns(
        coords: Vec<IVec2>,
        signal: Vec<f64>,
        mut noise: Vec<f64>,
    ) -> Result<Self, Error> {
        if coords.len() != signal.len() || signal.len() != noise.len() {
            return Err(Error::InputShapeMismatch {
                signal: (signal.len(), 1),
                noise: (noise.len(), 1),
            });
        }
        if coords.is_empty() {
            return Err(Error::NoPixels);
        }
        if let Some((index, &value)) = noise
            .iter()
            .enumerate()
            .find(|(_, n)| !(n.is_finite() && **n >= 0.0))
        {
            return Err(Error::InvalidNoise { index, value });
        }

        replace_zero_noise(&mut noise);

        let density = signal
            .iter()
            .zip(noise.iter())
            .map(|(s, n)| s / n)
            .collect();

        Ok(Self {
            coords,
            signal,
            noise,
            density,
        })
    }

    /// Replace the `signal / noise` density used for seeding and centroid weights.
    pub fn with_density(mut self, density: Vec<f64>) -> Self {
        assert_eq!(
            density.len(),
            self.len(),
            "density must have one value per pixel"
        );
        self.density = density;
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    #[inline]
    pub fn coord(&self, index: usize) -> IVec2 {
        self.coords[index]
    }

    /// Pixel position as a floating point vector.
    #[inline]
    pub fn position(&self, index: usize) -> DVec2 {
        self.coords[index].as_dvec2()
    }

    #[inline]
    pub fn coords(&self) -> &[IVec2] {
        &self.coords
    }

    #[inline]
    pub fn signal(&self) -> &[f64] {
        &self.signal
    }

    #[inline]
    pub fn noise(&self) -> &[f64] {
        &self.noise
    }

    #[inline]
    pub fn density(&self) -> &[f64] {
        &self.density
    }

    /// S/N of a single pixel.
    #[inline]
    pub fn pixel_sn(&self, index: usize) -> f64 {
        self.signal[index] / self.noise[index]
    }

    /// S/N of all pixels taken together.
    pub fn global_sn(&self) -> f64 {
        let signal: f64 = self.signal.iter().sum();
        let noise_sq: f64 = self.noise.iter().map(|n| n * n).sum();
        signal / noise_sq.sqrt()
    }

    pub fn min_pixel_sn(&self) -> f64 {
        (0..self.len())
            .map(|i| self.pixel_sn(i))
            .fold(f64::INFINITY, f64::min)
    }

    /// Index of the pixel with the highest density. Ties resolve to the lowest index.
    pub fn densest_pixel(&self) -> usize {
        let mut best = 0;
        for (i, &d) in self.density.iter().enumerate() {
            if d > self.density[best] {
                best = i;
            }
        }
        best
    }

    /// Index of the pixel closest to `point`. Ties resolve to the lowest index.
    pub fn nearest_pixel(&self, point: DVec2) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for i in 0..self.len() {
            let dist = self.position(i).distance_squared(point);
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }
        best
    }
}

fn replace_zero_noise(noise: &mut [f64]) {
    let min_positive = noise
        .iter()
        .copied()
        .filter(|&n| n > 0.0)
        .fold(f64::INFINITY, f64::min);
    let replacement = if min_positive.is_finite() {
        min_positive * ZERO_NOISE_FACTOR
    } else {
        ZERO_NOISE_FACTOR
    };

    let mut replaced = 0usize;
    for n in noise.iter_mut().filter(|n| **n == 0.0) {
        *n = replacement;
        replaced += 1;
    }
    if replaced > 0 {
        tracing::debug!(
            "Replaced zero noise in {} pixels with {:e}",
            replaced,
            replacement
        );
    }
}
