//! Object kinds, both as authored in the scene and as exported.

use serde::{Deserialize, Serialize};

/// The kind of asset a scene exports as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    #[default]
    Model,
    Scenario,
    Sky,
    DecoratorSet,
    ParticleModel,
    Prefab,
    Animation,
}

impl AssetCategory {
    pub const ALL: [AssetCategory; 7] = [
        Self::Model,
        Self::Scenario,
        Self::Sky,
        Self::DecoratorSet,
        Self::ParticleModel,
        Self::Prefab,
        Self::Animation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Scenario => "scenario",
            Self::Sky => "sky",
            Self::DecoratorSet => "decorator_set",
            Self::ParticleModel => "particle_model",
            Self::Prefab => "prefab",
            Self::Animation => "animation",
        }
    }

    /// Categories whose regions table names BSPs.
    pub fn is_map(self) -> bool {
        matches!(self, Self::Scenario | Self::Prefab)
    }

    /// Categories exported as a single render model.
    pub fn is_render_asset(self) -> bool {
        matches!(self, Self::Model | Self::Sky | Self::DecoratorSet | Self::ParticleModel)
    }

    /// Categories that carry region and permutation tables.
    pub fn supports_regions(self) -> bool {
        matches!(self, Self::Model | Self::Sky | Self::Scenario | Self::Prefab)
    }
}

impl std::fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mesh type as chosen by the artist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawMeshKind {
    #[default]
    Default,
    Collision,
    Physics,
    ObjectInstance,
    Structure,
    Instance,
    Seam,
    Portal,
    WaterSurface,
    WaterPhysicsVolume,
    RainSheet,
    RainBlocker,
    FogVolume,
    SoftCeiling,
    SoftKill,
    SlipSurface,
    LightmapOnly,
    LightmapExclude,
    Streaming,
    CookieCutter,
}

/// Marker type as chosen by the artist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawMarkerKind {
    #[default]
    Model,
    Effects,
    Garbage,
    Hint,
    PathfindingSphere,
    PhysicsConstraint,
    Target,
    GameInstance,
    Airprobe,
    Envfx,
    LightCone,
}

/// Classification key for meshes and markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    Mesh(RawMeshKind),
    Marker(RawMarkerKind),
}

impl std::fmt::Display for RawKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mesh(kind) => write!(f, "{:?}", kind),
            Self::Marker(kind) => write!(f, "{:?} marker", kind),
        }
    }
}

/// Export-facing mesh type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshType {
    Default,
    Collision,
    Physics,
    ObjectInstance,
    Poop,
    PoopCollision,
    Seam,
    Portal,
    WaterSurface,
    WaterPhysicsVolume,
    PoopVerticalRainSheet,
    PoopRainBlocker,
    PlanarFogVolume,
    BoundarySurface,
    ObbVolume,
    CookieCutter,
    Decorator,
}

impl MeshType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "_connected_geometry_mesh_type_default",
            Self::Collision => "_connected_geometry_mesh_type_collision",
            Self::Physics => "_connected_geometry_mesh_type_physics",
            Self::ObjectInstance => "_connected_geometry_mesh_type_object_instance",
            Self::Poop => "_connected_geometry_mesh_type_poop",
            Self::PoopCollision => "_connected_geometry_mesh_type_poop_collision",
            Self::Seam => "_connected_geometry_mesh_type_seam",
            Self::Portal => "_connected_geometry_mesh_type_portal",
            Self::WaterSurface => "_connected_geometry_mesh_type_water_surface",
            Self::WaterPhysicsVolume => "_connected_geometry_mesh_type_water_physics_volume",
            Self::PoopVerticalRainSheet => "_connected_geometry_mesh_type_poop_vertical_rain_sheet",
            Self::PoopRainBlocker => "_connected_geometry_mesh_type_poop_rain_blocker",
            Self::PlanarFogVolume => "_connected_geometry_mesh_type_planar_fog_volume",
            Self::BoundarySurface => "_connected_geometry_mesh_type_boundary_surface",
            Self::ObbVolume => "_connected_geometry_mesh_type_obb_volume",
            Self::CookieCutter => "_connected_geometry_mesh_type_cookie_cutter",
            Self::Decorator => "_connected_geometry_mesh_type_decorator",
        }
    }

    /// Mesh types that render, for the given target and category.
    pub fn is_render(self, corinth: bool, category: AssetCategory) -> bool {
        match self {
            Self::Poop
            | Self::WaterSurface
            | Self::Decorator
            | Self::ObjectInstance
            | Self::PoopRainBlocker
            | Self::PoopVerticalRainSheet => true,
            Self::Default => !corinth || matches!(category, AssetCategory::Model | AssetCategory::Sky),
            _ => false,
        }
    }

    /// Scenario mesh types exported in the design BSP.
    pub fn is_design(self) -> bool {
        matches!(
            self,
            Self::PlanarFogVolume
                | Self::BoundarySurface
                | Self::WaterPhysicsVolume
                | Self::PoopRainBlocker
                | Self::PoopVerticalRainSheet
        )
    }
}

/// Export-facing marker type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerType {
    Model,
    Effects,
    Garbage,
    Hint,
    PathfindingSphere,
    PhysicsConstraint,
    Target,
    GameInstance,
    Airprobe,
    Envfx,
    LightCone,
}

impl MarkerType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Model => "_connected_geometry_marker_type_model",
            Self::Effects => "_connected_geometry_marker_type_effects",
            Self::Garbage => "_connected_geometry_marker_type_garbage",
            Self::Hint => "_connected_geometry_marker_type_hint",
            Self::PathfindingSphere => "_connected_geometry_marker_type_pathfinding_sphere",
            Self::PhysicsConstraint => "_connected_geometry_marker_type_physics_constraint",
            Self::Target => "_connected_geometry_marker_type_target",
            Self::GameInstance => "_connected_geometry_marker_type_game_instance",
            Self::Airprobe => "_connected_geometry_marker_type_airprobe",
            Self::Envfx => "_connected_geometry_marker_type_envfx",
            Self::LightCone => "_connected_geometry_marker_type_lightCone",
        }
    }
}

impl From<RawMarkerKind> for MarkerType {
    fn from(kind: RawMarkerKind) -> Self {
        match kind {
            RawMarkerKind::Model => Self::Model,
            RawMarkerKind::Effects => Self::Effects,
            RawMarkerKind::Garbage => Self::Garbage,
            RawMarkerKind::Hint => Self::Hint,
            RawMarkerKind::PathfindingSphere => Self::PathfindingSphere,
            RawMarkerKind::PhysicsConstraint => Self::PhysicsConstraint,
            RawMarkerKind::Target => Self::Target,
            RawMarkerKind::GameInstance => Self::GameInstance,
            RawMarkerKind::Airprobe => Self::Airprobe,
            RawMarkerKind::Envfx => Self::Envfx,
            RawMarkerKind::LightCone => Self::LightCone,
        }
    }
}

/// What an export object is, once classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "object_type", content = "type", rename_all = "snake_case")]
pub enum ExportKind {
    Mesh(MeshType),
    Marker(MarkerType),
    Frame,
    Light,
}

impl ExportKind {
    pub fn object_type(&self) -> &'static str {
        match self {
            Self::Mesh(_) => "_connected_geometry_object_type_mesh",
            Self::Marker(_) => "_connected_geometry_object_type_marker",
            Self::Frame => "_connected_geometry_object_type_frame",
            Self::Light => "_connected_geometry_object_type_light",
        }
    }

    pub fn mesh_type(&self) -> Option<MeshType> {
        match self {
            Self::Mesh(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_mesh(&self) -> bool {
        matches!(self, Self::Mesh(_))
    }
}
