use crate::error::{Error, Result};
use crate::grid::{Geometry, Grid3};

use ndarray::{Array4, Axis};

/// A freshly loaded slice stack, before channel reduction.
///
/// Samples are laid out as (depth, height, width, components). A planar
/// input is a volume of depth 1.
#[derive(Clone, Debug)]
pub struct Volume {
    data: Array4<f32>,
    geometry: Geometry,
}

impl Volume {
    pub fn new(data: Array4<f32>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    /// Get the spatial dimensions of the volume (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        let (depth, height, width, _) = self.data.dim();
        (depth, height, width)
    }

    /// Number of values stored per sample; more than one means vector
    /// pixels that must be reduced before any scalar operation.
    pub fn components(&self) -> usize {
        self.data.len_of(Axis(3))
    }

    pub fn is_planar(&self) -> bool {
        self.dim().0 == 1
    }

    pub fn data(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Collapse vector pixels to one scalar channel.
    ///
    /// Single-component volumes pass through regardless of `index`. For
    /// vector volumes `index` must name an existing component; every other
    /// component is dropped.
    ///
    /// # Errors
    ///
    /// [`Error::ComponentOutOfRange`] when `index` does not exist.
    pub fn select_component(self, index: usize) -> Result<Grid3> {
        let components = self.components();
        if components > 1 && index >= components {
            return Err(Error::ComponentOutOfRange { index, components });
        }
        let index = if components == 1 { 0 } else { index };
        if components > 1 {
            log::info!("Selecting component {index} of {components}");
        }
        Ok(Grid3::new(
            self.data.index_axis_move(Axis(3), index),
            self.geometry,
        ))
    }

    /// [`Volume::select_component`] with the first component.
    pub fn into_scalar(self) -> Result<Grid3> {
        self.select_component(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_volume() -> Volume {
        let data = Array4::from_shape_fn((2, 3, 4, 3), |(z, y, x, c)| {
            (c * 1000 + z * 100 + y * 10 + x) as f32
        });
        Volume::new(data, Geometry::default())
    }

    #[test]
    fn first_component_by_default() {
        let volume = rgb_volume();
        assert_eq!(volume.components(), 3);

        let grid = volume.into_scalar().unwrap();
        assert_eq!(grid.dim(), (2, 3, 4));
        assert_eq!(grid.data()[[1, 2, 3]], 123.0);
    }

    #[test]
    fn explicit_component() {
        let grid = rgb_volume().select_component(2).unwrap();
        assert_eq!(grid.data()[[0, 0, 1]], 2001.0);
    }

    #[test]
    fn missing_component_is_an_error() {
        let err = rgb_volume().select_component(3).unwrap_err();
        assert!(matches!(
            err,
            Error::ComponentOutOfRange {
                index: 3,
                components: 3
            }
        ));
    }

    #[test]
    fn scalar_volume_passes_through() {
        let data = Array4::from_shape_fn((1, 2, 2, 1), |(_, y, x, _)| (y * 2 + x) as f32);
        let volume = Volume::new(data, Geometry::default());
        assert!(volume.is_planar());

        let grid = volume.select_component(5).unwrap();
        let values: Vec<f32> = grid.data().iter().copied().collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);
    }
}
