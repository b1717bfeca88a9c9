//! Indexed polygon meshes.
//!
//! A [`Mesh`] is never edited once partitioning starts: splitting always
//! produces new meshes through [`Mesh::extract`].

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// A polygon referencing vertices by index, wound counter-clockwise.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Face {
    pub vertices: Vec<u32>,
    /// Index into the mesh material slots.
    #[serde(default)]
    pub material: Option<u32>,
}

impl Face {
    pub fn new(vertices: Vec<u32>) -> Self {
        Self {
            vertices,
            material: None,
        }
    }
}

/// Polygon mesh geometry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Per-vertex texture coordinates; empty when the mesh has no UV channel.
    #[serde(default)]
    pub uvs: Vec<Vec2>,
    pub faces: Vec<Face>,
    /// Material slots; `None` is an empty slot.
    #[serde(default)]
    pub materials: Vec<Option<String>>,
}

/// Result of [`Mesh::extract`].
#[derive(Debug, Clone)]
pub struct Extracted {
    pub mesh: Mesh,
    /// For each vertex of the new mesh, its index in the source mesh.
    pub vertex_map: Vec<u32>,
}

impl Mesh {
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Check every face references existing vertices and material slots.
    pub fn validate(&self) -> Result<()> {
        for (index, face) in self.faces.iter().enumerate() {
            if face.vertices.len() < 3 {
                return Err(ForgeError::InvalidScene {
                    reason: format!("mesh '{}' face {} has fewer than 3 vertices", self.name, index),
                });
            }
            if let Some(&v) = face
                .vertices
                .iter()
                .find(|&&v| v as usize >= self.positions.len())
            {
                return Err(ForgeError::InvalidScene {
                    reason: format!("mesh '{}' face {} references missing vertex {}", self.name, index, v),
                });
            }
            if let Some(m) = face.material {
                if m as usize >= self.materials.len() {
                    return Err(ForgeError::InvalidScene {
                        reason: format!("mesh '{}' face {} uses missing material slot {}", self.name, index, m),
                    });
                }
            }
        }
        if !self.uvs.is_empty() && self.uvs.len() != self.positions.len() {
            return Err(ForgeError::InvalidScene {
                reason: format!("mesh '{}' has {} uvs for {} vertices", self.name, self.uvs.len(), self.positions.len()),
            });
        }
        Ok(())
    }

    /// Copy out the given faces (source indices, in the order given),
    /// keeping only the vertices they use.
    pub fn extract(&self, faces: &[u32]) -> Extracted {
        let mut remap: Vec<Option<u32>> = vec![None; self.positions.len()];
        let mut vertex_map = Vec::new();
        let mut out_faces = Vec::with_capacity(faces.len());

        for &face_index in faces {
            let face = &self.faces[face_index as usize];
            let vertices = face
                .vertices
                .iter()
                .map(|&v| {
                    *remap[v as usize].get_or_insert_with(|| {
                        vertex_map.push(v);
                        (vertex_map.len() - 1) as u32
                    })
                })
                .collect();
            out_faces.push(Face {
                vertices,
                material: face.material,
            });
        }

        let positions = vertex_map.iter().map(|&v| self.positions[v as usize]).collect();
        let uvs = if self.uvs.is_empty() {
            Vec::new()
        } else {
            vertex_map.iter().map(|&v| self.uvs[v as usize]).collect()
        };

        Extracted {
            mesh: Mesh {
                name: self.name.clone(),
                positions,
                uvs,
                faces: out_faces,
                materials: self.materials.clone(),
            },
            vertex_map,
        }
    }

    /// Copy with every face winding reversed.
    pub fn flipped(&self) -> Mesh {
        let mut mesh = self.clone();
        for face in &mut mesh.faces {
            face.vertices.reverse();
        }
        mesh
    }

    /// Area-weighted face normal (Newell's method), not normalized.
    fn face_area_normal(&self, face: &Face) -> Vec3 {
        let mut normal = Vec3::ZERO;
        let n = face.vertices.len();
        for i in 0..n {
            let a = self.positions[face.vertices[i] as usize];
            let b = self.positions[face.vertices[(i + 1) % n] as usize];
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal
    }

    pub fn face_normal(&self, face_index: usize) -> Vec3 {
        self.face_area_normal(&self.faces[face_index]).normalize_or_zero()
    }

    /// Smooth per-vertex normals accumulated from adjacent faces.
    pub fn vertex_normals(&self) -> Vec<Vec3> {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for face in &self.faces {
            let n = self.face_area_normal(face);
            for &v in &face.vertices {
                normals[v as usize] += n;
            }
        }
        normals.into_iter().map(Vec3::normalize_or_zero).collect()
    }

    /// Vertex normals laid out per face corner.
    pub fn corner_normals(&self) -> Vec<Vec3> {
        let normals = self.vertex_normals();
        self.faces
            .iter()
            .flat_map(|f| f.vertices.iter().map(|&v| normals[v as usize]))
            .collect()
    }

    /// Mean of all vertex positions.
    pub fn centroid(&self) -> Vec3 {
        if self.positions.is_empty() {
            return Vec3::ZERO;
        }
        self.positions.iter().copied().sum::<Vec3>() / self.positions.len() as f32
    }
}
