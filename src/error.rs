use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("No usable slices found in input")]
    EmptyInput,

    #[error("Inconsistent slice geometry at slice {index}: {reason}")]
    GeometryMismatch { index: usize, reason: String },

    #[error("Invalid threshold range: lower {lower} is greater than upper {upper}")]
    InvalidThresholdRange { lower: f32, upper: f32 },

    #[error("Invalid grid shape {0:?}")]
    InvalidGridShape(Vec<usize>),

    #[error("Grid contains no samples")]
    EmptyGrid,

    #[error("Component {index} out of range for {components}-component pixels")]
    ComponentOutOfRange { index: usize, components: usize },

    #[error("Face {face} references vertex {vertex} but the mesh has {vertices} vertices")]
    FaceIndexOutOfBounds {
        face: usize,
        vertex: usize,
        vertices: usize,
    },

    #[error("Failed to write {}: {source}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn write_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::WriteFailed {
            path: path.into(),
            source,
        }
    }

    /// Maps image encoder failures onto the write taxonomy when they are
    /// plain I/O problems with the destination.
    pub(crate) fn from_image_write(path: impl Into<PathBuf>, error: image::ImageError) -> Self {
        match error {
            image::ImageError::IoError(source) => Error::write_failed(path, source),
            other => Error::Image(other),
        }
    }
}
