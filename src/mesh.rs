use crate::error::{Error, Result};

use std::collections::HashSet;

pub type Point3 = [f32; 3];

/// Indexed triangle mesh.
///
/// Every face index is guaranteed to be a valid vertex index. A mesh with
/// no faces is a legitimate result (no iso-surface crossing).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Point3>,
    faces: Vec<[usize; 3]>,
}

impl Mesh {
    /// # Errors
    ///
    /// [`Error::FaceIndexOutOfBounds`] if any face names a missing vertex.
    pub fn new(vertices: Vec<Point3>, faces: Vec<[usize; 3]>) -> Result<Self> {
        for (face, indices) in faces.iter().enumerate() {
            if let Some(&vertex) = indices.iter().find(|&&i| i >= vertices.len()) {
                return Err(Error::FaceIndexOutOfBounds {
                    face,
                    vertex,
                    vertices: vertices.len(),
                });
            }
        }
        Ok(Self { vertices, faces })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[usize; 3]] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn triangle(&self, face: usize) -> [Point3; 3] {
        self.faces[face].map(|i| self.vertices[i])
    }

    /// Unit normal following the counter-clockwise winding, or +Z for a
    /// degenerate triangle.
    pub fn face_normal(&self, face: usize) -> Point3 {
        let [a, b, c] = self.triangle(face);
        let e1 = sub(b, a);
        let e2 = sub(c, a);
        let n = cross(e1, e2);
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        if len > 0.0 {
            [n[0] / len, n[1] / len, n[2] / len]
        } else {
            [0.0, 0.0, 1.0]
        }
    }

    /// Axis-aligned bounding box as `(min, max)`, `None` without vertices.
    pub fn bounds(&self) -> Option<(Point3, Point3)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(lo, hi), p| {
            (
                [lo[0].min(p[0]), lo[1].min(p[1]), lo[2].min(p[2])],
                [hi[0].max(p[0]), hi[1].max(p[1]), hi[2].max(p[2])],
            )
        }))
    }

    /// Signed enclosed volume. Positive when faces wind outward.
    pub fn signed_volume(&self) -> f64 {
        (0..self.faces.len())
            .map(|f| {
                let [a, b, c] = self.triangle(f).map(|p| p.map(f64::from));
                (a[0] * (b[1] * c[2] - b[2] * c[1]) - a[1] * (b[0] * c[2] - b[2] * c[0])
                    + a[2] * (b[0] * c[1] - b[1] * c[0]))
                    / 6.0
            })
            .sum()
    }

    /// True when every directed edge is matched by exactly one opposite
    /// edge, i.e. the surface is watertight and consistently wound.
    pub fn is_closed(&self) -> bool {
        let mut directed = HashSet::with_capacity(self.faces.len() * 3);
        for &[a, b, c] in &self.faces {
            for edge in [(a, b), (b, c), (c, a)] {
                if !directed.insert(edge) {
                    return false;
                }
            }
        }
        directed.iter().all(|&(a, b)| directed.contains(&(b, a)))
    }
}

fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: Point3, b: Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
