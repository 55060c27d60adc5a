use crate::enums::{PreviewChannels, PreviewStrategy};
use crate::error::{Error, Result};
use crate::grid::{Grid, Grid2};

use image::{DynamicImage, GrayImage};
use ndarray::{Dimension, Zip};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Smallest and largest finite sample of a grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IntensityRange {
    pub min: f32,
    pub max: f32,
}

impl IntensityRange {
    /// `None` unless `min <= max`.
    pub fn new(min: f32, max: f32) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    /// Scan a grid for its range, ignoring non-finite samples.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyGrid`] when the grid holds no finite sample.
    pub fn of<D: Dimension>(grid: &Grid<f32, D>) -> Result<Self> {
        let (min, max) = grid
            .data()
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Self::new(min, max).ok_or(Error::EmptyGrid)
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    pub fn is_degenerate(&self) -> bool {
        self.span() == 0.0
    }
}

/// Window center (level) and width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowParameters {
    pub center: f32,
    pub width: f32,
}

impl WindowParameters {
    pub fn new(center: f32, width: f32) -> Self {
        Self { center, width }
    }

    /// A window centred on the range covering `fraction` of its span.
    pub fn from_range(range: IntensityRange, fraction: f32) -> Self {
        let span = range.span();
        Self {
            center: range.min + span / 2.0,
            width: span * fraction,
        }
    }

    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.center - self.width / 2.0
    }

    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.center + self.width / 2.0
    }

    /// Position of `value` inside the window, clamped to `[0, 1]`.
    fn ratio(&self, value: f32) -> f32 {
        if self.width <= 0.0 {
            return if value >= self.center { 1.0 } else { 0.0 };
        }
        ((value - self.lower_bound()) / self.width).clamp(0.0, 1.0)
    }
}

/// The mapping chosen for one grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IntensityMapping {
    /// Window/level contrast adjustment.
    Window(WindowParameters),
    /// Straight linear stretch of the full range.
    Linear(IntensityRange),
    /// Negative values to zero, then divide by `max`.
    Direct { max: f32 },
    /// Every sample gets the same output value.
    Flat(u8),
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NormalizerConfig {
    #[serde(default)]
    pub strategy: PreviewStrategy,

    /// Ranges wider than this are windowed instead of stretched.
    #[serde(default = "default_wide_range_threshold")]
    pub wide_range_threshold: f32,

    /// Share of the range covered by the window.
    #[serde(default = "default_window_fraction")]
    pub window_fraction: f32,

    #[serde(default = "default_output_min")]
    pub output_min: u8,

    #[serde(default = "default_output_max")]
    pub output_max: u8,
}

fn default_wide_range_threshold() -> f32 {
    255.0
}

fn default_window_fraction() -> f32 {
    0.8
}

fn default_output_min() -> u8 {
    u8::MIN
}

fn default_output_max() -> u8 {
    u8::MAX
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            strategy: PreviewStrategy::default(),
            wide_range_threshold: default_wide_range_threshold(),
            window_fraction: default_window_fraction(),
            output_min: default_output_min(),
            output_max: default_output_max(),
        }
    }
}

/// Rescales grids to 8-bit samples.
#[derive(Clone, Copy, Debug, Default)]
pub struct IntensityNormalizer {
    config: NormalizerConfig,
}

impl IntensityNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Pick the mapping for a grid whose samples span `range`.
    pub fn mapping(&self, range: IntensityRange) -> IntensityMapping {
        match self.config.strategy {
            PreviewStrategy::Direct => {
                if range.max > 0.0 {
                    IntensityMapping::Direct { max: range.max }
                } else {
                    IntensityMapping::Flat(self.config.output_min)
                }
            }
            PreviewStrategy::Windowed => {
                if range.is_degenerate() {
                    IntensityMapping::Flat(self.midpoint())
                } else if range.span() > self.config.wide_range_threshold {
                    IntensityMapping::Window(WindowParameters::from_range(
                        range,
                        self.config.window_fraction,
                    ))
                } else {
                    IntensityMapping::Linear(range)
                }
            }
        }
    }

    /// Map every sample of `grid` to the configured 8-bit output range.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyGrid`] if the grid has no finite samples.
    pub fn normalize<D: Dimension>(&self, grid: &Grid<f32, D>) -> Result<Grid<u8, D>> {
        let range = IntensityRange::of(grid)?;
        let mapping = self.mapping(range);
        log::debug!(
            "Intensity range [{}, {}] mapped with {:?}",
            range.min,
            range.max,
            mapping
        );
        let data = Zip::from(grid.data()).par_map_collect(|&v| self.eval(&mapping, v));
        Ok(Grid::new(data, *grid.geometry()))
    }

    /// Output sample for `value` under `mapping`.
    pub fn eval(&self, mapping: &IntensityMapping, value: f32) -> u8 {
        if !value.is_finite() {
            return self.config.output_min;
        }
        let ratio = match *mapping {
            IntensityMapping::Flat(v) => return v,
            IntensityMapping::Window(window) => window.ratio(value),
            IntensityMapping::Linear(range) => {
                ((value - range.min) / range.span()).clamp(0.0, 1.0)
            }
            IntensityMapping::Direct { max } => (value.max(0.0) / max).clamp(0.0, 1.0),
        };
        self.scale(ratio)
    }

    fn scale(&self, ratio: f32) -> u8 {
        let lo = f32::from(self.config.output_min);
        let hi = f32::from(self.config.output_max);
        // truncation, 255 not 256
        (lo + ratio * (hi - lo)).clamp(0.0, 255.0) as u8
    }

    fn midpoint(&self) -> u8 {
        ((u16::from(self.config.output_min) + u16::from(self.config.output_max)) / 2) as u8
    }
}

/// Raster image of an 8-bit plane.
pub fn to_image(plane: &Grid2<u8>, channels: PreviewChannels) -> Result<DynamicImage> {
    plane.ensure_non_empty_axes()?;
    let (height, width) = plane.dim();
    let pixel_data: Vec<u8> = plane.data().iter().copied().collect();
    let gray = GrayImage::from_raw(width as u32, height as u32, pixel_data)
        .ok_or_else(|| Error::InvalidGridShape(plane.shape().to_vec()))?;
    Ok(match channels {
        PreviewChannels::Gray => DynamicImage::ImageLuma8(gray),
        PreviewChannels::Rgb => DynamicImage::ImageRgb8(DynamicImage::ImageLuma8(gray).to_rgb8()),
    })
}

/// Write an 8-bit plane; the format follows the extension of `path`.
pub fn save_image(plane: &Grid2<u8>, path: &Path, channels: PreviewChannels) -> Result<()> {
    to_image(plane, channels)?
        .save(path)
        .map_err(|e| Error::from_image_write(path, e))?;
    log::info!("Saved {}x{} image to {}", plane.dim().1, plane.dim().0, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array1, Array2, Array3, array};

    fn grid_of(values: &[f32]) -> Grid<f32, ndarray::Ix1> {
        Grid::from_array(Array1::from(values.to_vec()))
    }

    #[test]
    fn wide_range_uses_window() {
        let normalizer = IntensityNormalizer::default();
        let range = IntensityRange::new(0.0, 4000.0).unwrap();
        let IntensityMapping::Window(window) = normalizer.mapping(range) else {
            panic!("expected windowing for a wide range");
        };
        assert_relative_eq!(window.center, 2000.0);
        assert_relative_eq!(window.width, 3200.0);
        assert_relative_eq!(window.lower_bound(), 400.0);
        assert_relative_eq!(window.upper_bound(), 3600.0);

        let out = normalizer
            .normalize(&grid_of(&[0.0, 400.0, 2000.0, 3600.0, 4000.0]))
            .unwrap();
        assert_eq!(out.data().to_vec(), vec![0, 0, 127, 255, 255]);
    }

    #[test]
    fn narrow_range_is_stretched() {
        let normalizer = IntensityNormalizer::default();
        let range = IntensityRange::new(10.0, 200.0).unwrap();
        assert_eq!(normalizer.mapping(range), IntensityMapping::Linear(range));

        let out = normalizer.normalize(&grid_of(&[10.0, 105.0, 200.0])).unwrap();
        assert_eq!(out.data().to_vec(), vec![0, 127, 255]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let normalizer = IntensityNormalizer::default();
        let range = IntensityRange::new(0.0, 255.0).unwrap();
        assert!(matches!(normalizer.mapping(range), IntensityMapping::Linear(_)));
    }

    #[test]
    fn uniform_grid_is_flat() {
        let normalizer = IntensityNormalizer::default();
        let grid = Grid::from_array(Array3::from_elem((3, 4, 5), 42.0_f32));
        let out = normalizer.normalize(&grid).unwrap();
        assert!(out.data().iter().all(|&v| v == 127));
        assert_eq!(out.shape(), grid.shape());
    }

    #[test]
    fn empty_grid_is_an_error() {
        let grid = Grid::from_array(Array2::<f32>::zeros((0, 4)));
        let err = IntensityNormalizer::default().normalize(&grid).unwrap_err();
        assert!(matches!(err, Error::EmptyGrid));
    }

    #[test]
    fn non_finite_samples_are_ignored_for_the_range() {
        let grid = grid_of(&[f32::NAN, 10.0, 20.0]);
        let range = IntensityRange::of(&grid).unwrap();
        assert_eq!(range, IntensityRange { min: 10.0, max: 20.0 });
        let out = IntensityNormalizer::default().normalize(&grid).unwrap();
        assert_eq!(out.data().to_vec(), vec![0, 0, 255]);
    }

    #[test]
    fn direct_strategy_clamps_negatives() {
        let normalizer = IntensityNormalizer::new(NormalizerConfig {
            strategy: PreviewStrategy::Direct,
            ..Default::default()
        });
        let out = normalizer.normalize(&grid_of(&[-50.0, 0.0, 50.0, 100.0])).unwrap();
        assert_eq!(out.data().to_vec(), vec![0, 0, 127, 255]);

        let out = normalizer.normalize(&grid_of(&[-5.0, -1.0])).unwrap();
        assert_eq!(out.data().to_vec(), vec![0, 0]);
    }

    #[test]
    fn configurable_output_range() {
        let normalizer = IntensityNormalizer::new(NormalizerConfig {
            output_min: 10,
            output_max: 20,
            ..Default::default()
        });
        let out = normalizer.normalize(&grid_of(&[0.0, 100.0])).unwrap();
        assert_eq!(out.data().to_vec(), vec![10, 20]);
    }

    #[test]
    fn image_conversion_keeps_orientation() {
        let plane = Grid2::from_array(array![[1_u8, 2, 3], [4, 5, 6]]);
        let image = to_image(&plane, PreviewChannels::Gray).unwrap().to_luma8();
        assert_eq!((image.width(), image.height()), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [6]);

        let rgb = to_image(&plane, PreviewChannels::Rgb).unwrap();
        assert_eq!(rgb.color().channel_count(), 3);
    }
}
