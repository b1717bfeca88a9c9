//! Scene snapshot: the exporter's input, loaded once and passed by value.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use super::kinds::AssetCategory;
use super::layers::FaceLayerStore;
use super::mesh::Mesh;
use super::object::SceneObject;
use crate::error::{ForgeError, Result};

/// Name used wherever a region, permutation or BSP is left unset.
pub const DEFAULT_NAME: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInfo {
    pub name: String,
    pub category: AssetCategory,
    /// Asset directory relative to the project data directory.
    pub directory: PathBuf,
}

fn default_true() -> bool {
    true
}

/// One row of the regions table. For scenarios and prefabs these are BSPs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl RegionEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: true,
        }
    }
}

/// A mesh plus the face layers authored on it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneMesh {
    #[serde(flatten)]
    pub geometry: Mesh,
    #[serde(default)]
    pub layers: FaceLayerStore,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bone {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Armature {
    pub name: String,
    pub bones: Vec<Bone>,
}

impl Armature {
    pub fn roots(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter().filter(|b| b.parent.is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationKind {
    #[default]
    Base,
    Overlay,
    World,
    Replacement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Movement {
    #[default]
    None,
    Xy,
    XyYaw,
    XyzYaw,
    Full,
    World,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationSpace {
    #[default]
    Object,
    Local,
}

/// An animation clip, exported as its own job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    #[serde(default)]
    pub frame_start: i32,
    #[serde(default)]
    pub frame_end: i32,
    #[serde(default)]
    pub kind: AnimationKind,
    #[serde(default)]
    pub movement: Movement,
    #[serde(default)]
    pub space: AnimationSpace,
    #[serde(default)]
    pub pose_overlay: bool,
    #[serde(default)]
    pub compression: Option<String>,
    #[serde(default)]
    pub pca: bool,
    #[serde(default = "default_true")]
    pub export: bool,
    #[serde(default)]
    pub renames: Vec<String>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame_start: 0,
            frame_end: 0,
            kind: AnimationKind::default(),
            movement: Movement::default(),
            space: AnimationSpace::default(),
            pose_overlay: false,
            compression: None,
            pca: false,
            export: true,
            renames: Vec::new(),
        }
    }
}

/// The whole exportable scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub asset: AssetInfo,
    /// Source scene file, referenced from the manifest.
    #[serde(default)]
    pub source: PathBuf,
    #[serde(default)]
    pub regions: Vec<RegionEntry>,
    #[serde(default)]
    pub permutations: Vec<String>,
    #[serde(default)]
    pub meshes: Vec<SceneMesh>,
    #[serde(default)]
    pub objects: Vec<SceneObject>,
    #[serde(default)]
    pub armature: Option<Armature>,
    #[serde(default)]
    pub animations: Vec<AnimationClip>,
}

impl SceneSnapshot {
    pub fn new(asset: AssetInfo) -> Self {
        Self {
            asset,
            source: PathBuf::new(),
            regions: vec![RegionEntry::new(DEFAULT_NAME)],
            permutations: vec![DEFAULT_NAME.to_string()],
            meshes: Vec::new(),
            objects: Vec::new(),
            armature: None,
            animations: Vec::new(),
        }
    }

    /// Load a snapshot from JSON and validate its references.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ForgeError::SceneLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut snapshot: SceneSnapshot = serde_json::from_str(&content)?;
        if snapshot.source.as_os_str().is_empty() {
            snapshot.source = path.to_path_buf();
        }
        snapshot.fill_default_tables();
        snapshot.validate()?;
        debug!(
            "Loaded scene {} ({} objects, {} meshes)",
            snapshot.asset.name,
            snapshot.objects.len(),
            snapshot.meshes.len()
        );
        Ok(snapshot)
    }

    /// Empty region or permutation tables hold just `default`.
    pub fn fill_default_tables(&mut self) {
        if self.regions.is_empty() {
            self.regions.push(RegionEntry::new(DEFAULT_NAME));
        }
        if self.permutations.is_empty() {
            self.permutations.push(DEFAULT_NAME.to_string());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.asset.name.trim().is_empty() {
            return Err(ForgeError::InvalidScene {
                reason: "asset name is empty".to_string(),
            });
        }
        for mesh in &self.meshes {
            mesh.geometry.validate()?;
        }
        for object in &self.objects {
            if let Some(index) = object.mesh_index() {
                if index >= self.meshes.len() {
                    return Err(ForgeError::InvalidScene {
                        reason: format!("object '{}' references missing mesh {}", object.name, index),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn region_names(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.name.clone()).collect()
    }

    pub fn region_active(&self, name: &str) -> bool {
        self.regions
            .iter()
            .find(|r| r.name == name)
            .map_or(true, |r| r.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SCENE: &str = r#"{
        "asset": { "name": "crate", "category": "model", "directory": "objects/crate" },
        "meshes": [{
            "name": "box",
            "positions": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
            "faces": [{ "vertices": [0,1,2,3] }],
            "layers": [{ "name": "lip", "faces": [0], "overrides": { "ladder": true } }]
        }],
        "objects": [{ "name": "box", "type": "mesh", "mesh": 0 }]
    }"#;

    #[test]
    fn test_load_fills_tables_and_source() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("crate.json");
        fs::write(&path, SCENE).unwrap();

        let scene = SceneSnapshot::load(&path).unwrap();
        assert_eq!(scene.region_names(), vec!["default".to_string()]);
        assert_eq!(scene.permutations, vec!["default".to_string()]);
        assert_eq!(scene.source, path);
        assert_eq!(scene.meshes[0].layers.len(), 1);
        assert!(scene.meshes[0].layers.get(0).unwrap().overrides.ladder);
    }

    #[test]
    fn test_load_rejects_missing_mesh_reference() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("bad.json");
        fs::write(&path, SCENE.replace("\"mesh\": 0", "\"mesh\": 4")).unwrap();

        let result = SceneSnapshot::load(&path);
        assert!(matches!(result, Err(ForgeError::InvalidScene { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = SceneSnapshot::load(Path::new("/nonexistent/scene.json"));
        assert!(matches!(result, Err(ForgeError::SceneLoad { .. })));
    }
}
