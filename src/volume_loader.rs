use crate::enums::SortBy;
use crate::error::{Error, Result};
use crate::grid::{Geometry, Spacing};
use crate::volume::Volume;

use dicom::{
    object::{FileDicomObject, InMemDicomObject, open_file},
    pixeldata::{ConvertOptions, PixelDecoder, VoiLutOption},
};
use dicom_dictionary_std::tags;
use image::DynamicImage;
use ndarray::{Array4, Axis, s};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const RASTER_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Relative tolerance when comparing pixel spacing between slices.
const SPACING_TOLERANCE: f32 = 1e-4;

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LoaderConfig {
    #[serde(default)]
    pub sort_by: SortBy,

    /// Descend into sub-directories when loading a directory.
    #[serde(default = "default_true")]
    pub recursive: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            sort_by: SortBy::default(),
            recursive: true,
        }
    }
}

/// One decoded input file: one or more frames plus the tags needed to
/// order and place them.
struct DecodedSlice {
    order: Option<f32>,
    position: Option<[f32; 3]>,
    /// (row spacing, column spacing)
    pixel_spacing: Option<(f32, f32)>,
    slice_thickness: Option<f32>,
    spacing_between_slices: Option<f32>,
    /// (frames, rows, columns, samples)
    frames: Array4<f32>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VolumeLoader {
    config: LoaderConfig,
}

impl VolumeLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn with_sort_by(sort_by: SortBy) -> Self {
        Self::new(LoaderConfig {
            sort_by,
            ..Default::default()
        })
    }

    /// Load a directory, a single DICOM file (multi-frame files become 3-D
    /// volumes) or a single raster image.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Volume> {
        let path = path.as_ref();
        if path.is_dir() {
            self.load_from_directory(path)
        } else if has_extension(path, &RASTER_EXTENSIONS) {
            self.load_from_image_paths(&[path])
        } else {
            self.load_from_file_paths(&[path])
        }
    }

    /// Load a volume from DICOM objects
    ///
    /// # Arguments
    ///
    /// * `dicom_objects` - Slice of DICOM file objects
    ///
    /// # Errors
    ///
    /// Returns error if no valid images found or geometry is inconsistent
    pub fn load_from_dicom_objects(
        &self,
        dicom_objects: &[FileDicomObject<InMemDicomObject>],
    ) -> Result<Volume> {
        let slices = dicom_objects
            .iter()
            .filter_map(|dicom_object| self.decode_slice(dicom_object))
            .collect();
        self.assemble(slices)
    }

    /// Load a volume from file paths. Files are opened and decoded in
    /// parallel; files that cannot be read or decoded are skipped.
    pub fn load_from_file_paths(&self, paths: &[impl AsRef<Path> + Sync]) -> Result<Volume> {
        let decoded: Vec<Option<DecodedSlice>> = paths
            .par_iter()
            .map(|path| match open_file(path.as_ref()) {
                Ok(dicom_object) => self.decode_slice(&dicom_object),
                Err(e) => {
                    log::warn!("Skipping unreadable file {}: {e}", path.as_ref().display());
                    None
                }
            })
            .collect();

        self.assemble(decoded.into_iter().flatten().collect())
    }

    /// Load a volume from a directory containing .dcm files. Without any
    /// DICOM file, raster images in the directory are stacked instead.
    pub fn load_from_directory(&self, path: impl AsRef<Path>) -> Result<Volume> {
        let path = path.as_ref();
        let dicom_paths = collect_files(path, self.config.recursive, &["dcm"])?;
        if !dicom_paths.is_empty() {
            log::info!("Found {} DICOM files in {}", dicom_paths.len(), path.display());
            return self.load_from_file_paths(&dicom_paths);
        }

        let raster_paths = collect_files(path, self.config.recursive, &RASTER_EXTENSIONS)?;
        if raster_paths.is_empty() {
            return Err(Error::EmptyInput);
        }
        log::info!("Found {} raster slices in {}", raster_paths.len(), path.display());
        self.load_from_image_paths(&raster_paths)
    }

    /// Stack raster images in the given order with unit spacing. Gray
    /// images give one component, color images three.
    pub fn load_from_image_paths(&self, paths: &[impl AsRef<Path> + Sync]) -> Result<Volume> {
        let slices = paths
            .par_iter()
            .map(|path| -> Result<DecodedSlice> {
                let image = image::open(path.as_ref())?;
                Ok(DecodedSlice {
                    order: None,
                    position: None,
                    pixel_spacing: None,
                    slice_thickness: None,
                    spacing_between_slices: None,
                    frames: raster_frames(image)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::stack(slices)
    }

    fn decode_slice(&self, dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<DecodedSlice> {
        let frames = match Self::decode_frames(dicom_object) {
            Ok(frames) => frames,
            Err(e) => {
                log::warn!("Skipping slice without decodable pixel data: {e}");
                return None;
            }
        };

        Some(DecodedSlice {
            order: Self::get_sort_order(dicom_object, self.config.sort_by),
            position: Self::get_position(dicom_object),
            pixel_spacing: Self::get_pixel_spacing(dicom_object),
            slice_thickness: Self::get_float(dicom_object, tags::SLICE_THICKNESS),
            spacing_between_slices: Self::get_float(dicom_object, tags::SPACING_BETWEEN_SLICES),
            frames,
        })
    }

    /// Decode all frames with the modality LUT applied and no VOI LUT.
    fn decode_frames(
        dicom_object: &FileDicomObject<InMemDicomObject>,
    ) -> std::result::Result<Array4<f32>, dicom::pixeldata::Error> {
        let pixel_data = dicom_object.decode_pixel_data()?;
        let options = ConvertOptions::new().with_voi_lut(VoiLutOption::Identity);
        pixel_data.to_ndarray_with_options::<f32>(&options)
    }

    fn get_sort_order(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        sort_by: SortBy,
    ) -> Option<f32> {
        match sort_by {
            SortBy::ImagePositionPatient => Self::get_position(dicom_object).map(|p| p[2]),
            SortBy::TablePosition => Self::get_float(dicom_object, tags::TABLE_POSITION),
            SortBy::InstanceNumber => dicom_object
                .element(tags::INSTANCE_NUMBER)
                .ok()?
                .to_int::<i32>()
                .ok()
                .map(|n| n as f32),
            SortBy::None => None,
        }
    }

    fn get_position(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<[f32; 3]> {
        let pos = dicom_object
            .element(tags::IMAGE_POSITION_PATIENT)
            .ok()?
            .to_multi_float32()
            .ok()?;
        Some([*pos.first()?, *pos.get(1)?, *pos.get(2)?])
    }

    fn get_pixel_spacing(dicom_object: &FileDicomObject<InMemDicomObject>) -> Option<(f32, f32)> {
        let spacing = dicom_object
            .element(tags::PIXEL_SPACING)
            .ok()?
            .to_multi_float32()
            .ok()?;
        Some((*spacing.first()?, *spacing.get(1)?))
    }

    fn get_float(
        dicom_object: &FileDicomObject<InMemDicomObject>,
        tag: dicom::core::Tag,
    ) -> Option<f32> {
        dicom_object.element(tag).ok()?.to_float32().ok()
    }

    fn assemble(&self, mut slices: Vec<DecodedSlice>) -> Result<Volume> {
        if !matches!(self.config.sort_by, SortBy::None) {
            // stable, so equal keys keep input order
            slices.sort_by(|a, b| {
                a.order
                    .partial_cmp(&b.order)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        Self::stack(slices)
    }

    fn stack(slices: Vec<DecodedSlice>) -> Result<Volume> {
        let first = slices.first().ok_or(Error::EmptyInput)?;
        let (_, rows, columns, samples) = first.frames.dim();

        Self::validate_geometry(&slices)?;

        let depth: usize = slices.iter().map(|slice| slice.frames.len_of(Axis(0))).sum();
        if depth == 0 || rows == 0 || columns == 0 {
            return Err(Error::EmptyInput);
        }

        let geometry = Self::get_geometry(&slices);
        let mut volume = Array4::<f32>::zeros((depth, rows, columns, samples));
        let mut z = 0;
        for slice in &slices {
            let frames = slice.frames.len_of(Axis(0));
            volume.slice_mut(s![z..z + frames, .., .., ..]).assign(&slice.frames);
            z += frames;
        }

        log::info!(
            "Loaded volume {depth}x{rows}x{columns} with {samples} component(s), spacing {:?}",
            geometry.spacing
        );
        Ok(Volume::new(volume, geometry))
    }

    fn validate_geometry(slices: &[DecodedSlice]) -> Result<()> {
        let first = &slices[0];
        let (_, rows, columns, samples) = first.frames.dim();

        for (index, slice) in slices.iter().enumerate().skip(1) {
            let (_, r, c, n) = slice.frames.dim();
            if (r, c) != (rows, columns) {
                return Err(Error::GeometryMismatch {
                    index,
                    reason: format!("{c}x{r} pixels, expected {columns}x{rows}"),
                });
            }
            if n != samples {
                return Err(Error::GeometryMismatch {
                    index,
                    reason: format!("{n} samples per pixel, expected {samples}"),
                });
            }
            if let (Some(expected), Some(found)) = (first.pixel_spacing, slice.pixel_spacing) {
                if !spacing_matches(expected, found) {
                    return Err(Error::GeometryMismatch {
                        index,
                        reason: format!("pixel spacing {found:?}, expected {expected:?}"),
                    });
                }
            }
        }
        Ok(())
    }

    fn get_geometry(slices: &[DecodedSlice]) -> Geometry {
        let first = &slices[0];
        let (row_spacing, column_spacing) = first.pixel_spacing.unwrap_or((1.0, 1.0));

        let from_positions = match (first.position, slices.get(1).and_then(|s| s.position)) {
            (Some(a), Some(b)) => Some((b[2] - a[2]).abs()).filter(|d| *d > 0.0),
            _ => None,
        };
        let slice_spacing = from_positions
            .or(first.spacing_between_slices)
            .or(first.slice_thickness)
            .filter(|d| *d > 0.0)
            .unwrap_or(1.0);

        Geometry::new(
            Spacing {
                x: positive_or_unit(column_spacing),
                y: positive_or_unit(row_spacing),
                z: slice_spacing,
            },
            first.position.unwrap_or([0.0; 3]),
        )
    }
}

fn positive_or_unit(value: f32) -> f32 {
    if value > 0.0 { value } else { 1.0 }
}

fn spacing_matches(a: (f32, f32), b: (f32, f32)) -> bool {
    let close = |x: f32, y: f32| (x - y).abs() <= SPACING_TOLERANCE * x.abs().max(y.abs()).max(1.0);
    close(a.0, b.0) && close(a.1, b.1)
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

/// Files under `dir` with one of `extensions`, sorted by path. Symbolic
/// links to directories are not followed.
fn collect_files(dir: &Path, recursive: bool, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut found = Vec::new();
    for entry in WalkDir::new(dir).max_depth(max_depth).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.path();
        if path.is_file() && has_extension(path, extensions) {
            found.push(path.to_path_buf());
        }
    }
    found.sort();
    Ok(found)
}

fn raster_frames(image: DynamicImage) -> Result<Array4<f32>> {
    let (width, height) = (image.width() as usize, image.height() as usize);
    let (samples, values): (usize, Vec<f32>) = match image {
        DynamicImage::ImageLuma16(gray) => (1, gray.into_raw().into_iter().map(f32::from).collect()),
        image if image.color().has_color() => {
            (3, image.to_rgb8().into_raw().into_iter().map(f32::from).collect())
        }
        image => (1, image.to_luma8().into_raw().into_iter().map(f32::from).collect()),
    };
    Array4::from_shape_vec((1, height, width, samples), values)
        .map_err(|_| Error::InvalidGridShape(vec![1, height, width, samples]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn decoded(order: f32, rows: usize, columns: usize, spacing: (f32, f32)) -> DecodedSlice {
        DecodedSlice {
            order: Some(order),
            position: Some([0.0, 0.0, order * 2.5]),
            pixel_spacing: Some(spacing),
            slice_thickness: Some(5.0),
            spacing_between_slices: None,
            frames: Array4::from_elem((1, rows, columns, 1), order),
        }
    }

    #[test]
    fn slices_are_stacked_in_ascending_order() {
        let loader = VolumeLoader::default();
        let slices = vec![
            decoded(3.0, 2, 2, (0.5, 0.5)),
            decoded(1.0, 2, 2, (0.5, 0.5)),
            decoded(2.0, 2, 2, (0.5, 0.5)),
        ];
        let volume = loader.assemble(slices).unwrap();
        assert_eq!(volume.dim(), (3, 2, 2));
        let firsts: Vec<f32> = (0..3).map(|z| volume.data()[[z, 0, 0, 0]]).collect();
        assert_eq!(firsts, vec![1.0, 2.0, 3.0]);

        let geometry = volume.geometry();
        assert_eq!(geometry.spacing, Spacing { x: 0.5, y: 0.5, z: 2.5 });
        assert_eq!(geometry.origin, [0.0, 0.0, 2.5]);
    }

    #[test]
    fn unsorted_loader_keeps_input_order() {
        let loader = VolumeLoader::with_sort_by(SortBy::None);
        let volume = loader
            .assemble(vec![decoded(3.0, 1, 1, (1.0, 1.0)), decoded(1.0, 1, 1, (1.0, 1.0))])
            .unwrap();
        assert_eq!(volume.data()[[0, 0, 0, 0]], 3.0);
    }

    #[test]
    fn nothing_to_stack() {
        let err = VolumeLoader::default().assemble(Vec::new()).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }

    #[test]
    fn mismatched_dimensions() {
        let err = VolumeLoader::default()
            .assemble(vec![decoded(1.0, 2, 2, (1.0, 1.0)), decoded(2.0, 2, 3, (1.0, 1.0))])
            .unwrap_err();
        assert!(matches!(err, Error::GeometryMismatch { index: 1, .. }));
    }

    #[test]
    fn mismatched_pixel_spacing() {
        let err = VolumeLoader::default()
            .assemble(vec![decoded(1.0, 2, 2, (0.5, 0.5)), decoded(2.0, 2, 2, (0.7, 0.5))])
            .unwrap_err();
        assert!(matches!(err, Error::GeometryMismatch { .. }));
    }

    #[test]
    fn slice_thickness_is_the_fallback_spacing() {
        let mut slice = decoded(1.0, 2, 2, (0.5, 0.5));
        slice.position = None;
        let volume = VolumeLoader::default().assemble(vec![slice]).unwrap();
        assert!(volume.is_planar());
        assert_eq!(volume.geometry().spacing.z, 5.0);
    }

    #[test]
    fn raster_directory_is_stacked_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("b.png", 20_u8), ("a.png", 10), ("c.png", 30)] {
            GrayImage::from_pixel(4, 3, Luma([value]))
                .save(dir.path().join(name))
                .unwrap();
        }
        let volume = VolumeLoader::default().load(dir.path()).unwrap();
        assert_eq!(volume.dim(), (3, 3, 4));
        assert_eq!(volume.components(), 1);
        let firsts: Vec<f32> = (0..3).map(|z| volume.data()[[z, 0, 0, 0]]).collect();
        assert_eq!(firsts, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn color_raster_has_three_components() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        RgbImage::from_pixel(2, 2, Rgb([1, 2, 3])).save(&path).unwrap();

        let volume = VolumeLoader::default().load(&path).unwrap();
        assert_eq!(volume.components(), 3);
        assert_eq!(volume.data()[[0, 1, 1, 2]], 3.0);
    }

    #[test]
    fn unreadable_dicom_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.dcm"), b"not a dicom file").unwrap();

        let err = VolumeLoader::default().load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }

    #[cfg(unix)]
    #[test]
    fn directory_link_cycle_is_walked_once() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("a.png", 10_u8), ("b.png", 20)] {
            GrayImage::from_pixel(2, 2, Luma([value]))
                .save(dir.path().join(name))
                .unwrap();
        }
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let volume = VolumeLoader::default().load(dir.path()).unwrap();
        assert_eq!(volume.dim(), (2, 2, 2));
    }

    #[test]
    fn non_recursive_walk_stays_at_the_top() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        GrayImage::from_pixel(2, 2, Luma([1])).save(dir.path().join("top.png")).unwrap();
        GrayImage::from_pixel(2, 2, Luma([2])).save(nested.join("deep.png")).unwrap();

        let recursive = VolumeLoader::default().load(dir.path()).unwrap();
        assert_eq!(recursive.dim().0, 2);

        let flat = VolumeLoader::new(LoaderConfig {
            recursive: false,
            ..Default::default()
        })
        .load(dir.path())
        .unwrap();
        assert_eq!(flat.dim().0, 1);
        assert_eq!(flat.data()[[0, 0, 0, 0]], 1.0);
    }

    #[test]
    fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = VolumeLoader::default().load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
    }
}
