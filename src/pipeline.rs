use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::enums::Orientation;
use crate::export::MeshExporter;
use crate::grid::RepresentativeSlice;
use crate::marching_cubes::MeshReconstructor;
use crate::normalize::{IntensityNormalizer, save_image};
use crate::segment::{Segmenter, Threshold};
use crate::smooth::GaussianSmoother;
use crate::volume::Volume;
use crate::volume_loader::VolumeLoader;

use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a surface reconstruction. A face count of zero means the
/// threshold band produced no iso-surface; the file is still written.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshArtifact {
    pub path: PathBuf,
    pub vertex_count: usize,
    pub face_count: usize,
}

/// Runs the preview and reconstruction chains. Each call loads its own
/// volume; nothing is shared between calls.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn load(&self, volume_path: &Path) -> Result<Volume> {
        VolumeLoader::new(self.config.loader).load(volume_path)
    }

    /// Read, reduce to one channel, take the middle slice, normalise to
    /// 8 bits and write the image to `output_path`.
    pub fn make_preview(
        &self,
        volume_path: impl AsRef<Path>,
        output_path: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let output_path = output_path.as_ref();
        let preview = &self.config.preview;

        let grid = self.load(volume_path.as_ref())?.select_component(preview.component)?;
        let plane = grid.representative_slice()?;
        let normalized = IntensityNormalizer::new(preview.normalizer).normalize(&plane)?;
        save_image(&normalized, output_path, preview.channels)?;

        Ok(output_path.to_path_buf())
    }

    /// Read, reduce to one channel, binarize to the `[lower, upper]` band,
    /// extract the `iso_level` surface and write it as STL.
    pub fn make_mesh(
        &self,
        volume_path: impl AsRef<Path>,
        lower: f32,
        upper: f32,
        iso_level: f32,
        output_path: impl AsRef<Path>,
    ) -> Result<MeshArtifact> {
        let output_path = output_path.as_ref();
        let mesh_config = &self.config.mesh;
        let threshold = Threshold::new(lower, upper)?;

        let grid = self.load(volume_path.as_ref())?.select_component(mesh_config.component)?;
        let grid = GaussianSmoother::new(mesh_config.smoothing_sigma).apply(grid);
        let mask = Segmenter::binarize(threshold, mesh_config.inside_value, mesh_config.outside_value)
            .apply(grid);
        let mesh = MeshReconstructor::new(iso_level)
            .with_physical_coordinates(mesh_config.physical_coordinates)
            .reconstruct(&mask)?;

        if mesh.is_empty() {
            log::warn!("No iso-surface crossing at level {iso_level} for band [{lower}, {upper}]");
        }
        MeshExporter::write_stl(&mesh, output_path)?;

        Ok(MeshArtifact {
            path: output_path.to_path_buf(),
            vertex_count: mesh.vertex_count(),
            face_count: mesh.face_count(),
        })
    }

    /// Clip the volume to `[lower, upper]`, normalise it as a whole and
    /// write every axial slice to `output_dir` as
    /// `segmented_slice_<i>.png`.
    pub fn make_segmented_slices(
        &self,
        volume_path: impl AsRef<Path>,
        lower: f32,
        upper: f32,
        output_dir: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>> {
        let output_dir = output_dir.as_ref();
        let preview = &self.config.preview;
        let threshold = Threshold::new(lower, upper)?;

        let grid = self.load(volume_path.as_ref())?.select_component(preview.component)?;
        let clipped = Segmenter::clip(threshold).apply(grid);
        let normalized = IntensityNormalizer::new(preview.normalizer).normalize(&clipped)?;

        fs::create_dir_all(output_dir).map_err(|e| Error::write_failed(output_dir, e))?;
        let (depth, _, _) = normalized.dim();
        (0..depth)
            .map(|i| {
                let path = output_dir.join(format!("segmented_slice_{i}.png"));
                let plane = normalized.slice_along(i, Orientation::Axial)?;
                save_image(&plane, &path, preview.channels)?;
                Ok(path)
            })
            .collect()
    }
}

/// [`Pipeline::make_preview`] with the default configuration.
pub fn make_preview(volume_path: impl AsRef<Path>, output_path: impl AsRef<Path>) -> Result<PathBuf> {
    Pipeline::default().make_preview(volume_path, output_path)
}

/// [`Pipeline::make_mesh`] with the default configuration.
pub fn make_mesh(
    volume_path: impl AsRef<Path>,
    lower: f32,
    upper: f32,
    iso_level: f32,
    output_path: impl AsRef<Path>,
) -> Result<MeshArtifact> {
    Pipeline::default().make_mesh(volume_path, lower, upper, iso_level, output_path)
}
