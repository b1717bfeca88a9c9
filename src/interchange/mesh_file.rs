//! Binary interchange file handed to the converter.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::jobs::ExportJob;
use crate::normalize::{NormalizedScene, INVALID_MATERIAL};
use crate::scene::{AnimationClip, ExportObject, Mesh};

pub const MAGIC: [u8; 4] = *b"TFIX";
pub const VERSION: u16 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneNode {
    pub name: String,
    /// Index of the parent bone in the bone list.
    pub parent: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonNode {
    pub name: String,
    pub bones: Vec<BoneNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshNode {
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub faces: Vec<Vec<u32>>,
    /// Per-face index into `materials`.
    pub face_materials: Vec<u32>,
    /// One normal per face corner, in face order.
    pub corner_normals: Vec<[f32; 3]>,
    pub materials: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectNode {
    pub name: String,
    pub object_type: String,
    pub parent: Option<String>,
    pub parent_bone: Option<String>,
    /// Column-major world matrix.
    pub matrix: [f32; 16],
    pub mesh: Option<MeshNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipNode {
    pub name: String,
    pub frame_start: i32,
    pub frame_end: i32,
}

/// Everything one job hands the converter besides its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterchangeFile {
    pub magic: [u8; 4],
    pub version: u16,
    pub skeleton: SkeletonNode,
    pub objects: Vec<ObjectNode>,
    pub clip: Option<ClipNode>,
}

impl InterchangeFile {
    pub fn build(scene: &NormalizedScene, job: &ExportJob) -> Self {
        let bones = &scene.skeleton.bones;
        let skeleton = SkeletonNode {
            name: scene.skeleton.name.clone(),
            bones: bones
                .iter()
                .map(|b| BoneNode {
                    name: b.name.clone(),
                    parent: b
                        .parent
                        .as_ref()
                        .and_then(|p| bones.iter().position(|o| &o.name == p))
                        .map(|i| i as u32),
                })
                .collect(),
        };

        let objects = job
            .objects
            .iter()
            .filter_map(|&i| scene.objects.get(i))
            .map(|o| object_node(&o.object))
            .collect();

        let clip = job
            .clip
            .as_ref()
            .and_then(|name| scene.animations.iter().find(|a| &a.name == name))
            .map(clip_node);

        Self {
            magic: MAGIC,
            version: VERSION,
            skeleton,
            objects,
            clip,
        }
    }

    /// Write to a sibling temporary file, then rename it over `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        let io_err = |source| ForgeError::InterchangeWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = Path::new(&tmp);

        let mut writer = BufWriter::new(File::create(tmp).map_err(io_err)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush().map_err(io_err)?;
        drop(writer);
        fs::rename(tmp, path).map_err(io_err)?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let file: InterchangeFile = bincode::deserialize_from(reader)?;
        if file.magic != MAGIC || file.version != VERSION {
            return Err(ForgeError::InvalidScene {
                reason: format!("{} is not a version {} interchange file", path.display(), VERSION),
            });
        }
        Ok(file)
    }

    pub fn face_count(&self) -> usize {
        self.objects.iter().filter_map(|o| o.mesh.as_ref()).map(|m| m.faces.len()).sum()
    }
}

fn object_node(object: &ExportObject) -> ObjectNode {
    let mesh = object.mesh.as_ref().map(|mesh| {
        let corner_normals = match &object.normals {
            Some(binding) => binding.corner_normals(mesh),
            None => mesh.corner_normals(),
        };
        let (materials, face_materials) = material_slots(mesh);
        MeshNode {
            positions: mesh.positions.iter().map(|p| p.to_array()).collect(),
            uvs: mesh.uvs.iter().map(|uv| uv.to_array()).collect(),
            faces: mesh.faces.iter().map(|f| f.vertices.clone()).collect(),
            face_materials,
            corner_normals: corner_normals.iter().map(|n| n.to_array()).collect(),
            materials,
        }
    });
    ObjectNode {
        name: object.name.clone(),
        object_type: object.kind.object_type().to_string(),
        parent: object.parent.clone(),
        parent_bone: object.parent_bone.clone(),
        matrix: object.transform.matrix().to_cols_array(),
        mesh,
    }
}

/// One name per material slot, empty slots and unassigned faces pointing at
/// the placeholder material.
fn material_slots(mesh: &Mesh) -> (Vec<String>, Vec<u32>) {
    let mut materials: Vec<String> = mesh
        .materials
        .iter()
        .map(|slot| slot.clone().unwrap_or_else(|| INVALID_MATERIAL.to_string()))
        .collect();
    let mut placeholder = None;
    let face_materials = mesh
        .faces
        .iter()
        .map(|face| match face.material {
            Some(index) if (index as usize) < materials.len() => index,
            _ => *placeholder.get_or_insert_with(|| {
                materials
                    .iter()
                    .position(|m| m == INVALID_MATERIAL)
                    .unwrap_or_else(|| {
                        materials.push(INVALID_MATERIAL.to_string());
                        materials.len() - 1
                    }) as u32
            }),
        })
        .collect();
    (materials, face_materials)
}

fn clip_node(clip: &AnimationClip) -> ClipNode {
    ClipNode {
        name: clip.name.clone(),
        frame_start: clip.frame_start,
        frame_end: clip.frame_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Target;
    use crate::jobs::{JobFilter, JobPlanner, JobRole};
    use crate::normalize::Normalizer;
    use crate::scene::mesh::tests::quad_strip;
    use crate::scene::{AssetCategory, AssetInfo, ObjectKind, RawMeshKind, SceneMesh, SceneObject, SceneSnapshot};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn normalized() -> NormalizedScene {
        let mut scene = SceneSnapshot::new(AssetInfo {
            name: "crate".into(),
            category: AssetCategory::Model,
            directory: PathBuf::from("objects/crate"),
        });
        scene.meshes.push(SceneMesh {
            geometry: quad_strip(3),
            layers: Default::default(),
        });
        scene.objects.push(SceneObject::new(
            "body",
            ObjectKind::Mesh {
                mesh: 0,
                mesh_type: RawMeshKind::Default,
            },
        ));
        Normalizer::new(Target::Reach).normalize(scene).unwrap()
    }

    #[test]
    fn test_build_render_job() {
        let scene = normalized();
        let plan = JobPlanner::new(JobFilter::default()).plan(&scene).unwrap();
        let job = plan.with_role(JobRole::Render).next().unwrap();

        let file = InterchangeFile::build(&scene, job);
        assert_eq!(file.objects.len(), 1);
        assert_eq!(file.face_count(), 3);
        assert_eq!(file.skeleton.bones.len(), 1);
        assert_eq!(file.skeleton.bones[0].parent, None);
        let mesh = file.objects[0].mesh.as_ref().unwrap();
        let corners: usize = mesh.faces.iter().map(Vec::len).sum();
        assert_eq!(mesh.corner_normals.len(), corners);
        assert_eq!(mesh.uvs.len(), mesh.positions.len());
    }

    #[test]
    fn test_collision_job_keeps_material_slots() {
        let mut scene = SceneSnapshot::new(AssetInfo {
            name: "rock".into(),
            category: AssetCategory::Model,
            directory: PathBuf::from("objects/rock"),
        });
        let mut geometry = quad_strip(3);
        geometry.materials = vec![None, Some("rock".into())];
        geometry.faces[0].material = Some(1);
        geometry.faces[1].material = Some(1);
        geometry.faces[2].material = None;
        scene.meshes.push(SceneMesh {
            geometry,
            layers: Default::default(),
        });
        scene.objects.push(SceneObject::new(
            "hull",
            ObjectKind::Mesh {
                mesh: 0,
                mesh_type: RawMeshKind::Collision,
            },
        ));
        let scene = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        let plan = JobPlanner::new(JobFilter::default()).plan(&scene).unwrap();
        let job = plan.with_role(JobRole::Collision).next().unwrap();

        let file = InterchangeFile::build(&scene, job);
        let mesh = file.objects[0].mesh.as_ref().unwrap();
        assert_eq!(mesh.materials, vec![INVALID_MATERIAL.to_string(), "rock".to_string()]);
        assert_eq!(mesh.face_materials, vec![1, 1, 0]);
        assert!(mesh.face_materials.iter().all(|&i| (i as usize) < mesh.materials.len()));
    }

    #[test]
    fn test_write_replaces_atomically() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("models/crate_render.fbx");
        let scene = normalized();
        let plan = JobPlanner::new(JobFilter::default()).plan(&scene).unwrap();
        let file = InterchangeFile::build(&scene, &plan.jobs[0]);

        file.write(&path).unwrap();
        file.write(&path).unwrap();
        assert!(!temp.path().join("models/crate_render.fbx.tmp").exists());
        assert_eq!(InterchangeFile::read(&path).unwrap(), file);
    }

    #[test]
    fn test_read_rejects_foreign_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("other.fbx");
        let scene = normalized();
        let plan = JobPlanner::new(JobFilter::default()).plan(&scene).unwrap();
        let mut file = InterchangeFile::build(&scene, &plan.jobs[0]);
        file.magic = *b"FBX ";
        file.write(&path).unwrap();
        assert!(InterchangeFile::read(&path).is_err());
    }
}
