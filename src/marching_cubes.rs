use crate::error::Result;
use crate::grid::{Geometry, Grid3};
use crate::mesh::{Mesh, Point3};
use crate::tables::{CORNER_OFFSETS, EDGE_CORNERS, EDGE_TABLE, TRI_TABLE};

use ndarray::ArrayView3;
use rayon::prelude::*;
use std::collections::HashMap;

/// A surface vertex produced by one cube, keyed by the grid edge it lies
/// on so neighbouring cubes can share it.
#[derive(Clone, Copy, Debug)]
struct EdgeVertex {
    key: usize,
    /// Index-space position `(x, y, z)`.
    position: Point3,
}

/// Iso-surface extraction over a scalar volume.
#[derive(Clone, Copy, Debug)]
pub struct MeshReconstructor {
    iso_level: f32,
    physical_coordinates: bool,
}

impl MeshReconstructor {
    pub fn new(iso_level: f32) -> Self {
        Self {
            iso_level,
            physical_coordinates: true,
        }
    }

    /// When disabled, vertices stay in voxel index space instead of being
    /// scaled by spacing and shifted by origin.
    pub fn with_physical_coordinates(mut self, enabled: bool) -> Self {
        self.physical_coordinates = enabled;
        self
    }

    pub fn iso_level(&self) -> f32 {
        self.iso_level
    }

    /// Triangulate the `iso_level` surface of `grid`.
    ///
    /// Samples at or above the level are inside. Triangles wind
    /// counter-clockwise seen from outside, so normals point away from the
    /// inside region. Vertices shared between cubes are emitted once.
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidGridShape`] when any axis has zero length. A
    /// grid without any crossing yields an empty mesh, not an error.
    pub fn reconstruct(&self, grid: &Grid3) -> Result<Mesh> {
        grid.ensure_non_empty_axes()?;
        let (depth, height, width) = grid.dim();
        if depth < 2 || height < 2 || width < 2 {
            log::info!("Grid {depth}x{height}x{width} holds no complete cube");
            return Ok(Mesh::empty());
        }

        let data = grid.data().view();
        let slabs: Vec<Vec<[EdgeVertex; 3]>> = (0..depth - 1)
            .into_par_iter()
            .map(|z| self.march_slab(&data, z))
            .collect();

        let triangle_count = slabs.iter().map(Vec::len).sum();
        let mut index: HashMap<usize, usize> = HashMap::with_capacity(triangle_count);
        let mut vertices = Vec::with_capacity(triangle_count / 2);
        let mut faces = Vec::with_capacity(triangle_count);
        let geometry = grid.geometry();

        for triangle in slabs.into_iter().flatten() {
            let face = triangle.map(|vertex| {
                *index.entry(vertex.key).or_insert_with(|| {
                    vertices.push(self.output_position(vertex.position, geometry));
                    vertices.len() - 1
                })
            });
            faces.push(face);
        }

        log::info!(
            "Marching cubes at level {}: {} vertices, {} faces",
            self.iso_level,
            vertices.len(),
            faces.len()
        );
        Mesh::new(vertices, faces)
    }

    /// Triangles of every cube whose lower corner lies on slice `z`.
    fn march_slab(&self, data: &ArrayView3<f32>, z: usize) -> Vec<[EdgeVertex; 3]> {
        let (_, height, width) = data.dim();
        let mut triangles = Vec::new();

        for y in 0..height - 1 {
            for x in 0..width - 1 {
                let corners = CORNER_OFFSETS.map(|[dx, dy, dz]| {
                    let p = [x + dx, y + dy, z + dz];
                    (p, data[[p[2], p[1], p[0]]])
                });

                let case = corners
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, value))| !(*value >= self.iso_level))
                    .fold(0_usize, |case, (i, _)| case | (1 << i));

                if EDGE_TABLE[case] == 0 {
                    continue;
                }

                let mut edge_vertices: [Option<EdgeVertex>; 12] = [None; 12];
                for (edge, &[a, b]) in EDGE_CORNERS.iter().enumerate() {
                    if EDGE_TABLE[case] & (1 << edge) != 0 {
                        edge_vertices[edge] = Some(self.edge_vertex(
                            corners[a],
                            corners[b],
                            height,
                            width,
                        ));
                    }
                }

                for tri in TRI_TABLE[case].chunks_exact(3) {
                    if tri[0] < 0 {
                        break;
                    }
                    let vertex = |e: i8| edge_vertices[e as usize];
                    if let (Some(a), Some(b), Some(c)) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2])) {
                        triangles.push([a, b, c]);
                    }
                }
            }
        }

        triangles
    }

    /// Crossing point on the grid edge between two corners. Always
    /// interpolated from the lower corner so every cube sharing the edge
    /// computes the same position.
    fn edge_vertex(
        &self,
        a: ([usize; 3], f32),
        b: ([usize; 3], f32),
        height: usize,
        width: usize,
    ) -> EdgeVertex {
        let ((lo, v_lo), (hi, v_hi)) = if a.0 <= b.0 { (a, b) } else { (b, a) };
        let axis = (0..3).find(|&k| lo[k] != hi[k]).unwrap_or(0);
        let key = ((lo[2] * height + lo[1]) * width + lo[0]) * 3 + axis;

        let mu = (self.iso_level - v_lo) / (v_hi - v_lo);
        let mu = if mu.is_finite() { mu.clamp(0.0, 1.0) } else { 0.5 };
        let mut position = lo.map(|c| c as f32);
        position[axis] += mu;

        EdgeVertex { key, position }
    }

    fn output_position(&self, p: Point3, geometry: &Geometry) -> Point3 {
        if !self.physical_coordinates {
            return p;
        }
        let s = geometry.spacing;
        let o = geometry.origin;
        [o[0] + p[0] * s.x, o[1] + p[1] * s.y, o[2] + p[2] * s.z]
    }
}
