//! Scene objects as authored, and export objects as resolved.

use std::sync::Arc;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::kinds::{ExportKind, RawMarkerKind, RawMeshKind};
use super::mesh::Mesh;
use super::props::{FaceOverrides, MeshProps};
use crate::partition::NormalBinding;

/// World-space placement of an object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.matrix().transform_point3(point)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    #[default]
    Point,
    Spot,
    Sun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightData {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub intensity: f32,
    /// Spot cone angle in radians.
    pub spot_angle: f32,
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            spot_angle: std::f32::consts::FRAC_PI_4,
        }
    }
}

/// Node payload of an authored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectKind {
    Mesh {
        /// Index into the snapshot mesh list; shared by linked objects.
        mesh: usize,
        #[serde(default)]
        mesh_type: RawMeshKind,
    },
    Marker {
        #[serde(default)]
        marker_type: RawMarkerKind,
        #[serde(default)]
        game_instance_tag: Option<String>,
    },
    Frame,
    Light {
        #[serde(default)]
        light: LightData,
    },
}

fn default_true() -> bool {
    true
}

/// An object as it appears in the scene snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    #[serde(flatten)]
    pub kind: ObjectKind,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub parent_bone: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub permutation: Option<String>,
    #[serde(default)]
    pub transform: Transform,
    /// False when collection visibility excludes the object.
    #[serde(default = "default_true")]
    pub exportable: bool,
    /// Mesh level overrides, applied before any face layer.
    #[serde(default)]
    pub overrides: FaceOverrides,
    #[serde(default)]
    pub seam_back: Option<String>,
    #[serde(default)]
    pub seam_back_manual: bool,
    #[serde(default)]
    pub proxy_instance: bool,
    #[serde(default)]
    pub decorator_lod: Option<u8>,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            parent_bone: None,
            region: None,
            permutation: None,
            transform: Transform::default(),
            exportable: true,
            overrides: FaceOverrides::default(),
            seam_back: None,
            seam_back_manual: false,
            proxy_instance: false,
            decorator_lod: None,
        }
    }

    pub fn mesh_index(&self) -> Option<usize> {
        match self.kind {
            ObjectKind::Mesh { mesh, .. } => Some(mesh),
            _ => None,
        }
    }
}

/// An object with resolved identity, ready for job planning.
#[derive(Debug, Clone)]
pub struct ExportObject {
    pub name: String,
    pub kind: ExportKind,
    pub region: String,
    pub permutation: String,
    /// Owning BSP for scenario and prefab objects.
    pub bsp: Option<String>,
    pub parent: Option<String>,
    pub parent_bone: Option<String>,
    pub transform: Transform,
    pub mesh: Option<Arc<Mesh>>,
    /// Normal source for split render geometry.
    pub normals: Option<NormalBinding>,
    pub props: MeshProps,
    pub light: Option<LightData>,
    pub game_instance_tag: Option<String>,
    /// Names of the collision and physics proxies this object owns.
    pub proxies: Vec<String>,
}

impl ExportObject {
    pub fn new(name: impl Into<String>, kind: ExportKind) -> Self {
        Self {
            name: name.into(),
            kind,
            region: "default".to_string(),
            permutation: "default".to_string(),
            bsp: None,
            parent: None,
            parent_bone: None,
            transform: Transform::default(),
            mesh: None,
            normals: None,
            props: MeshProps::default(),
            light: None,
            game_instance_tag: None,
            proxies: Vec::new(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, |m| m.face_count())
    }

    /// World-space centroid of the object's geometry, or its origin.
    pub fn world_centroid(&self) -> Vec3 {
        match &self.mesh {
            Some(mesh) => self.transform.transform_point(mesh.centroid()),
            None => self.transform.translation,
        }
    }
}
