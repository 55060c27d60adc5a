use crate::error::{Error, Result};
use crate::mesh::Mesh;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

pub struct MeshExporter;

impl MeshExporter {
    /// Write `mesh` as binary STL.
    ///
    /// Faces keep their order and winding; each facet normal is computed
    /// from the winding. An empty mesh still produces a valid file with a
    /// zero triangle count.
    ///
    /// # Errors
    ///
    /// [`Error::WriteFailed`] if the destination cannot be created or written.
    pub fn write_stl(mesh: &Mesh, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::write_failed(path, e))?;
        let mut writer = BufWriter::new(file);

        let triangles = (0..mesh.face_count()).map(|face| {
            let [a, b, c] = mesh.triangle(face);
            stl_io::Triangle {
                normal: stl_io::Normal::new(mesh.face_normal(face)),
                vertices: [
                    stl_io::Vertex::new(a),
                    stl_io::Vertex::new(b),
                    stl_io::Vertex::new(c),
                ],
            }
        });

        stl_io::write_stl(&mut writer, triangles).map_err(|e| Error::write_failed(path, e))?;
        writer.flush().map_err(|e| Error::write_failed(path, e))?;

        log::info!(
            "Wrote {} triangles to {}",
            mesh.face_count(),
            path.display()
        );
        Ok(())
    }

    /// Read an STL file back into an indexed mesh. Coincident vertices are
    /// merged by the reader.
    pub fn read_stl(path: &Path) -> Result<Mesh> {
        let mut reader = BufReader::new(File::open(path)?);
        let stl = stl_io::read_stl(&mut reader)?;
        let vertices = stl
            .vertices
            .iter()
            .map(|v| [v[0], v[1], v[2]])
            .collect();
        let faces = stl.faces.iter().map(|f| f.vertices).collect();
        Mesh::new(vertices, faces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;
    use crate::marching_cubes::MeshReconstructor;
    use ndarray::Array3;

    #[test]
    fn empty_mesh_writes_a_header_only_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.stl");
        MeshExporter::write_stl(&Mesh::empty(), &path).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 84);
        let back = MeshExporter::read_stl(&path).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn round_trip_keeps_counts() {
        let data = Array3::from_shape_fn((6, 6, 6), |(z, y, x)| {
            let inside = (1..5).contains(&z) && (2..4).contains(&y) && (1..4).contains(&x);
            if inside { 1.0 } else { 0.0 }
        });
        let mesh = MeshReconstructor::new(0.5)
            .reconstruct(&Grid::from_array(data))
            .unwrap();
        assert!(!mesh.is_empty());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("box.stl");
        MeshExporter::write_stl(&mesh, &path).unwrap();
        let back = MeshExporter::read_stl(&path).unwrap();

        assert_eq!(back.vertex_count(), mesh.vertex_count());
        assert_eq!(back.face_count(), mesh.face_count());
        assert!(back.is_closed());
    }

    #[test]
    fn unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("mesh.stl");
        let err = MeshExporter::write_stl(&Mesh::empty(), &path).unwrap_err();
        assert!(matches!(err, Error::WriteFailed { .. }));
    }
}
