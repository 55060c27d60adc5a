use crate::enums::PreviewChannels;
use crate::error::Result;
use crate::normalize::NormalizerConfig;
use crate::volume_loader::LoaderConfig;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings for both entry points. Every field has a default, so an empty
/// TOML document is a valid configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub loader: LoaderConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub mesh: MeshConfig,
}

impl PipelineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::from_toml_str(&fs::read_to_string(path)?)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Component kept from vector pixels.
    #[serde(default)]
    pub component: usize,

    #[serde(default)]
    pub channels: PreviewChannels,

    #[serde(default)]
    pub normalizer: NormalizerConfig,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Component kept from vector pixels.
    #[serde(default)]
    pub component: usize,

    #[serde(default = "default_inside_value")]
    pub inside_value: f32,

    #[serde(default)]
    pub outside_value: f32,

    /// Gaussian sigma in voxels applied before thresholding; 0 disables.
    #[serde(default)]
    pub smoothing_sigma: f32,

    /// Emit vertices in patient space (spacing and origin applied).
    #[serde(default = "default_physical_coordinates")]
    pub physical_coordinates: bool,
}

fn default_inside_value() -> f32 {
    1.0
}

fn default_physical_coordinates() -> bool {
    true
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            component: 0,
            inside_value: default_inside_value(),
            outside_value: 0.0,
            smoothing_sigma: 0.0,
            physical_coordinates: default_physical_coordinates(),
        }
    }
}

impl MeshConfig {
    /// Midway between the two mask labels.
    pub fn default_iso_level(&self) -> f32 {
        (self.inside_value + self.outside_value) / 2.0
    }
}
