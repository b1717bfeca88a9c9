//! Scene data model
//!
//! The exporter reads one [`SceneSnapshot`] and never mutates it; each later
//! stage produces a new value from the previous one.

pub mod kinds;
pub mod layers;
pub mod mesh;
pub mod object;
pub mod props;
pub mod snapshot;

pub use kinds::{AssetCategory, ExportKind, MarkerType, MeshType, RawKind, RawMarkerKind, RawMeshKind};
pub use layers::{FaceLayer, FaceLayerStore};
pub use mesh::{Extracted, Face, Mesh};
pub use object::{ExportObject, LightData, LightKind, ObjectKind, SceneObject, Transform};
pub use props::{
    BoundarySurfaceType, CollisionOverride, DrawDistance, EmissiveOverride, EmissiveProps, FaceMode, FaceOverrides,
    FaceSides, LightmapProps, MeshProps, ObbVolumeType, PoopCollisionType, TwoSidedKind,
};
pub use snapshot::{
    AnimationClip, AnimationKind, AnimationSpace, Armature, AssetInfo, Bone, Movement, RegionEntry, SceneMesh,
    SceneSnapshot, DEFAULT_NAME,
};
