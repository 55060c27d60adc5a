use crate::enums::SegmentationPolicy;
use crate::error::{Error, Result};
use crate::grid::{Grid, Mask};

use ndarray::{Dimension, Zip};

/// Inclusive intensity band `[lower, upper]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Threshold {
    lower: f32,
    upper: f32,
}

impl Threshold {
    /// # Errors
    ///
    /// [`Error::InvalidThresholdRange`] unless `lower <= upper`. The band is
    /// never reordered on the caller's behalf.
    pub fn new(lower: f32, upper: f32) -> Result<Self> {
        if lower <= upper {
            Ok(Self { lower, upper })
        } else {
            Err(Error::InvalidThresholdRange { lower, upper })
        }
    }

    pub fn lower(&self) -> f32 {
        self.lower
    }

    pub fn upper(&self) -> f32 {
        self.upper
    }

    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Segmenter {
    threshold: Threshold,
    policy: SegmentationPolicy,
}

impl Segmenter {
    pub fn new(threshold: Threshold, policy: SegmentationPolicy) -> Self {
        Self { threshold, policy }
    }

    /// Binary mask with the given inside/outside labels.
    pub fn binarize(threshold: Threshold, inside: f32, outside: f32) -> Self {
        Self::new(threshold, SegmentationPolicy::Binarize { inside, outside })
    }

    pub fn clip(threshold: Threshold) -> Self {
        Self::new(threshold, SegmentationPolicy::Clip)
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn policy(&self) -> SegmentationPolicy {
        self.policy
    }

    /// Consumes `grid` and returns a mask of the same shape and geometry.
    pub fn apply<D: Dimension>(&self, grid: Grid<f32, D>) -> Mask<D> {
        let Threshold { lower, upper } = self.threshold;
        log::info!("Segmenting [{lower}, {upper}] with {:?}", self.policy);
        match self.policy {
            SegmentationPolicy::Binarize { inside, outside } => grid.map_data(|mut data| {
                Zip::from(&mut data).par_for_each(|v| {
                    *v = if self.threshold.contains(*v) {
                        inside
                    } else {
                        outside
                    };
                });
                data
            }),
            SegmentationPolicy::Clip => grid.map_data(|mut data| {
                Zip::from(&mut data).par_for_each(|v| *v = v.clamp(lower, upper));
                data
            }),
        }
    }
}
