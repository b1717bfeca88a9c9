//! Normal transfer from an unsplit mesh onto its sub-meshes.
//!
//! Splitting breaks vertex sharing along the cut, so normals recomputed on a
//! sub-mesh would crease there. A [`NormalBinding`] keeps the source mesh and
//! reads every corner normal from it instead.

use std::sync::Arc;

use glam::Vec3;

use crate::scene::Mesh;

/// An unmodified mesh and its smooth vertex normals, shared by all bindings
/// made from one partition.
#[derive(Debug, Clone)]
pub struct NormalSource {
    mesh: Arc<Mesh>,
    normals: Arc<[Vec3]>,
}

impl NormalSource {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        let normals = mesh.vertex_normals().into();
        Self { mesh, normals }
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    /// Bind a sub-mesh extracted from the source through `vertex_map`.
    pub fn bind(&self, vertex_map: Vec<u32>) -> NormalBinding {
        NormalBinding {
            source: self.clone(),
            vertex_map: vertex_map.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalBinding {
    source: NormalSource,
    vertex_map: Arc<[u32]>,
}

impl NormalBinding {
    pub fn source_mesh(&self) -> &Arc<Mesh> {
        self.source.mesh()
    }

    /// Per-corner normals for `part`, taken from the source mesh.
    pub fn corner_normals(&self, part: &Mesh) -> Vec<Vec3> {
        part.faces
            .iter()
            .flat_map(|face| {
                face.vertices.iter().map(|&v| {
                    self.vertex_map
                        .get(v as usize)
                        .and_then(|&src| self.source.normals.get(src as usize))
                        .copied()
                        .unwrap_or(Vec3::ZERO)
                })
            })
            .collect()
    }
}
