use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Axial,
    Coronal,
    Sagittal,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    ImagePositionPatient,
    TablePosition,
    InstanceNumber,
    None,
}

/// How the preview path turns intensities into 8-bit samples.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewStrategy {
    /// Window/level for wide dynamic ranges, linear rescale otherwise.
    #[default]
    Windowed,
    /// Negative values clamped to zero, then divided by the maximum.
    Direct,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewChannels {
    #[default]
    Gray,
    Rgb,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SegmentationPolicy {
    /// In-band samples become `inside`, everything else `outside`.
    Binarize { inside: f32, outside: f32 },
    /// Out-of-band samples are clamped to the nearest band edge.
    Clip,
}

impl Default for SegmentationPolicy {
    fn default() -> Self {
        SegmentationPolicy::Binarize {
            inside: 1.0,
            outside: 0.0,
        }
    }
}
