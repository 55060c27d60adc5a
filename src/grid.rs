use crate::enums::Orientation;
use crate::error::{Error, Result};

use ndarray::{Array, Axis, Dimension, Ix2, Ix3};

/// Physical distance between neighbouring samples, in millimetres.
///
/// `x` runs along columns, `y` along rows and `z` along the stacking axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spacing {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Geometry {
    pub spacing: Spacing,
    /// Patient-space position of the first sample, `[x, y, z]`.
    pub origin: [f32; 3],
}

impl Geometry {
    pub fn new(spacing: Spacing, origin: [f32; 3]) -> Self {
        Self { spacing, origin }
    }

    /// Geometry of the plane cut out of a volume with this geometry at
    /// `index` along the axis matching `orientation`. The plane's rows and
    /// columns take the spacing of the volume axes they came from; its
    /// origin is the volume origin moved to the cut.
    fn plane(&self, orientation: Orientation, index: usize) -> Geometry {
        let Spacing { x, y, z } = self.spacing;
        let offset = index as f32;
        let [ox, oy, oz] = self.origin;
        let (spacing, origin) = match orientation {
            Orientation::Axial => (Spacing { x, y, z }, [ox, oy, oz + offset * z]),
            // (depth, width) plane
            Orientation::Coronal => (Spacing { x, y: z, z: y }, [ox, oy + offset * y, oz]),
            // (depth, height) plane
            Orientation::Sagittal => (Spacing { x: y, y: z, z: x }, [ox + offset * x, oy, oz]),
        };
        Geometry { spacing, origin }
    }
}

/// A scalar sample grid together with its geometry.
///
/// Grids are handed from one stage to the next by value; every stage
/// produces a fresh grid instead of editing its input.
#[derive(Clone, Debug)]
pub struct Grid<A, D: Dimension> {
    data: Array<A, D>,
    geometry: Geometry,
}

pub type Grid2<A = f32> = Grid<A, Ix2>;
pub type Grid3<A = f32> = Grid<A, Ix3>;

/// A grid tagging voxels as inside or outside a region of interest.
pub type Mask<D> = Grid<f32, D>;

impl<A, D: Dimension> Grid<A, D> {
    pub fn new(data: Array<A, D>, geometry: Geometry) -> Self {
        Self { data, geometry }
    }

    pub fn from_array(data: Array<A, D>) -> Self {
        Self::new(data, Geometry::default())
    }

    pub fn data(&self) -> &Array<A, D> {
        &self.data
    }

    pub fn into_data(self) -> Array<A, D> {
        self.data
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Fails with [`Error::InvalidGridShape`] when any axis has zero length.
    pub fn ensure_non_empty_axes(&self) -> Result<()> {
        if self.data.shape().contains(&0) {
            return Err(Error::InvalidGridShape(self.data.shape().to_vec()));
        }
        Ok(())
    }

    pub(crate) fn map_data<B>(self, f: impl FnOnce(Array<A, D>) -> Array<B, D>) -> Grid<B, D> {
        Grid {
            data: f(self.data),
            geometry: self.geometry,
        }
    }
}

impl<A> Grid<A, Ix2> {
    /// (height, width)
    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }
}

impl<A> Grid<A, Ix3> {
    /// (depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize) {
        self.data.dim()
    }

    /// Index of the slice that stands in for the whole stack.
    pub fn representative_index(&self) -> usize {
        self.dim().0 / 2
    }
}

impl<A: Clone> Grid<A, Ix3> {
    /// Copies one plane out of the volume. Index is checked against the
    /// axis matching `orientation`.
    pub fn slice_along(&self, index: usize, orientation: Orientation) -> Result<Grid2<A>> {
        let axis = match orientation {
            Orientation::Axial => Axis(0),
            Orientation::Coronal => Axis(1),
            Orientation::Sagittal => Axis(2),
        };
        if index >= self.data.len_of(axis) {
            return Err(Error::InvalidGridShape(self.data.shape().to_vec()));
        }
        let plane = self.data.index_axis(axis, index).to_owned();
        Ok(Grid::new(plane, self.geometry.plane(orientation, index)))
    }
}

/// Reduces a grid to the single plane used for 2-D products.
pub trait RepresentativeSlice<A> {
    fn representative_slice(&self) -> Result<Grid2<A>>;
}

impl<A: Clone> RepresentativeSlice<A> for Grid<A, Ix3> {
    /// The middle axial slice, by floor division `depth / 2`.
    fn representative_slice(&self) -> Result<Grid2<A>> {
        self.ensure_non_empty_axes()?;
        let index = self.representative_index();
        log::debug!("Extracting slice {index} of {}", self.dim().0);
        self.slice_along(index, Orientation::Axial)
    }
}

impl<A: Clone> RepresentativeSlice<A> for Grid<A, Ix2> {
    fn representative_slice(&self) -> Result<Grid2<A>> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{Array2, Array3};

    fn stack(depth: usize) -> Grid3 {
        Grid::from_array(Array3::from_shape_fn((depth, 2, 3), |(z, _, _)| z as f32))
    }

    #[test]
    fn odd_depth_picks_centre() {
        for depth in [1, 3, 5, 9] {
            let slice = stack(depth).representative_slice().unwrap();
            assert_eq!(slice.data()[[0, 0]], ((depth - 1) / 2) as f32);
        }
    }

    #[test]
    fn even_depth_uses_floor_division() {
        for depth in [2, 4, 10] {
            let slice = stack(depth).representative_slice().unwrap();
            assert_eq!(slice.data()[[0, 0]], (depth / 2) as f32);
        }
    }

    #[test]
    fn source_volume_is_untouched() {
        let volume = stack(4);
        let before = volume.data().clone();
        let mut slice = volume.representative_slice().unwrap().into_data();
        slice.fill(-1.0);
        assert_eq!(volume.data(), &before);
    }

    #[test]
    fn planar_grid_is_identity() {
        let plane = Grid2::from_array(Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f32));
        let slice = plane.representative_slice().unwrap();
        assert_eq!(slice.data(), plane.data());
    }

    #[test]
    fn empty_stack_is_rejected() {
        let err = stack(0).representative_slice().unwrap_err();
        assert!(matches!(err, Error::InvalidGridShape(_)));
    }

    #[test]
    fn slice_along_each_axis() {
        let volume = Grid::new(
            Array3::from_shape_fn((2, 3, 4), |(z, y, x)| (z * 100 + y * 10 + x) as f32),
            Geometry::new(Spacing { x: 0.5, y: 0.7, z: 2.0 }, [0.0; 3]),
        );

        let coronal = volume.slice_along(1, Orientation::Coronal).unwrap();
        assert_eq!(coronal.dim(), (2, 4));
        assert_eq!(coronal.data()[[1, 3]], 113.0);
        assert_eq!(coronal.geometry().spacing.y, 2.0);

        let sagittal = volume.slice_along(2, Orientation::Sagittal).unwrap();
        assert_eq!(sagittal.dim(), (2, 3));
        assert_eq!(sagittal.data()[[1, 2]], 122.0);
        assert_eq!(sagittal.geometry().spacing.x, 0.7);

        assert!(volume.slice_along(4, Orientation::Sagittal).is_err());
    }

    #[test]
    fn plane_origin_moves_to_the_cut() {
        let volume = Grid::new(
            Array3::<f32>::zeros((4, 3, 5)),
            Geometry::new(Spacing { x: 0.5, y: 0.7, z: 2.0 }, [10.0, 20.0, 30.0]),
        );

        let axial = volume.slice_along(3, Orientation::Axial).unwrap();
        assert_eq!(axial.geometry().origin, [10.0, 20.0, 36.0]);

        let coronal = volume.slice_along(2, Orientation::Coronal).unwrap();
        let [x, y, z] = coronal.geometry().origin;
        assert_eq!((x, z), (10.0, 30.0));
        assert_relative_eq!(y, 21.4);

        let sagittal = volume.slice_along(4, Orientation::Sagittal).unwrap();
        assert_eq!(sagittal.geometry().origin, [12.0, 20.0, 30.0]);

        let first = volume.slice_along(0, Orientation::Axial).unwrap();
        assert_eq!(first.geometry().origin, volume.geometry().origin);
    }
}
