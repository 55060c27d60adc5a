//! # DICOM-surface library
//!
//! This crate turns a stack of DICOM slices into two artifacts: an 8-bit
//! preview image of the middle slice, and a triangle surface mesh of every
//! region whose intensity falls inside a threshold band.
//!
//! It builds on the dicom-rs ecosystem to read the slices. Volumes are
//! loaded from a directory (every ".dcm" file, or every raster image when
//! there is none), from an explicit list of files, or from a single
//! multi-frame file. Slices are decoded in parallel using rayon and sorted
//! along the slice axis, so spacing and origin come out in patient space.
//!
//! The two chains are:
//!
//!  - preview: read, pick one channel, take the middle slice, window or
//!    rescale to 8 bits, write a PNG/JPEG.
//!  - mesh: read, pick one channel, optionally smooth, binarize to the
//!    threshold band, run marching cubes, write binary STL.
//!
//! Both are available through [`Pipeline`] with a [`PipelineConfig`], or
//! through the free functions [`make_preview`] and [`make_mesh`] using the
//! defaults.
//!
//! # Examples
//!
//! ## Extracting a bone surface from a CT series
//!
//! ```no_run
//! # use dicom_surface::make_mesh;
//! let artifact = make_mesh("ct", 300.0, 3000.0, 0.5, "bone.stl")
//!     .expect("should have written the surface");
//! println!("{} faces", artifact.face_count);
//! ```
//!
//! ## Writing a preview with a custom window
//!
//! ```no_run
//! # use dicom_surface::{Pipeline, PipelineConfig};
//! let mut config = PipelineConfig::default();
//! config.preview.normalizer.window_fraction = 0.5;
//! Pipeline::new(config)
//!     .make_preview("ct", "preview.png")
//!     .expect("should have written the preview");
//! ```

pub mod config;
pub mod enums;
pub mod error;
pub mod export;
pub mod grid;
pub mod marching_cubes;
pub mod mesh;
pub mod normalize;
pub mod pipeline;
pub mod segment;
pub mod smooth;
mod tables;
pub mod volume;
pub mod volume_loader;

pub use config::{MeshConfig, PipelineConfig, PreviewConfig};
pub use enums::{Orientation, PreviewChannels, PreviewStrategy, SegmentationPolicy, SortBy};
pub use error::{Error, Result};
pub use export::MeshExporter;
pub use grid::{Geometry, Grid, Grid2, Grid3, Mask, RepresentativeSlice, Spacing};
pub use marching_cubes::MeshReconstructor;
pub use mesh::{Mesh, Point3};
pub use normalize::{IntensityNormalizer, NormalizerConfig};
pub use pipeline::{MeshArtifact, Pipeline, make_mesh, make_preview};
pub use segment::{Segmenter, Threshold};
pub use smooth::GaussianSmoother;
pub use volume::Volume;
pub use volume_loader::{LoaderConfig, VolumeLoader};
