//! Face and mesh property sets.
//!
//! [`FaceOverrides`] is what a face layer (or a whole object) asks for;
//! [`MeshProps`] is the resolved result carried by an export object.
//! Flags in `FaceOverrides` only ever switch a property on.

use serde::{Deserialize, Serialize};

/// Exclusive collision behaviour a layer can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionOverride {
    RenderOnly,
    CollisionOnly,
    SphereCollisionOnly,
    /// Corinth only.
    PlayerCollisionOnly,
    /// Corinth only.
    BulletCollisionOnly,
}

/// Back-face behaviour for two sided faces. Only corinth render meshes keep
/// anything other than `TwoSided`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TwoSidedKind {
    #[default]
    TwoSided,
    Mirror,
    Keep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawDistance {
    #[default]
    Normal,
    DetailMid,
    DetailClose,
}

impl DrawDistance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "_connected_geometry_face_draw_distance_normal",
            Self::DetailMid => "_connected_geometry_face_draw_distance_detail_mid",
            Self::DetailClose => "_connected_geometry_face_draw_distance_detail_close",
        }
    }
}

/// Emissive lighting as authored. Focus is in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmissiveOverride {
    pub power: f32,
    pub color: [f32; 4],
    pub focus: f32,
    pub attenuation_falloff: f32,
    pub attenuation_cutoff: f32,
    pub per_unit: bool,
    pub quality: bool,
    pub use_shader_gel: bool,
    pub bounce_ratio: f32,
}

impl Default for EmissiveOverride {
    fn default() -> Self {
        Self {
            power: 0.0,
            color: [1.0, 1.0, 1.0, 1.0],
            focus: 0.0,
            attenuation_falloff: 0.0,
            attenuation_cutoff: 0.0,
            per_unit: false,
            quality: false,
            use_shader_gel: false,
            bounce_ratio: 1.0,
        }
    }
}

/// Optional property overrides attached to a face layer or an object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceOverrides {
    pub collision: Option<CollisionOverride>,
    pub breakable: bool,
    pub two_sided: Option<TwoSidedKind>,
    pub transparent: bool,
    pub draw_distance: Option<DrawDistance>,
    pub region: Option<String>,
    pub global_material: Option<String>,
    pub ladder: bool,
    pub slip_surface: bool,
    pub decal_offset: bool,
    pub no_shadow: bool,
    pub precise_position: bool,
    pub no_lightmap: bool,
    pub no_pvs: bool,
    pub lightmap_additive_transparency: Option<[f32; 4]>,
    pub lightmap_resolution_scale: Option<f32>,
    pub lightmap_type: Option<String>,
    pub lightmap_translucency_tint: Option<[f32; 4]>,
    pub lightmap_both_sides: bool,
    pub emissive: Option<EmissiveOverride>,
}

impl FaceOverrides {
    pub fn is_two_sided(&self) -> bool {
        self.two_sided.is_some()
    }
}

/// Face mode written to `bungie_face_mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceMode {
    RenderOnly,
    CollisionOnly,
    SphereCollisionOnly,
    Breakable,
    LightmapOnly,
}

impl FaceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RenderOnly => "_connected_geometry_face_mode_render_only",
            Self::CollisionOnly => "_connected_geometry_face_mode_collision_only",
            Self::SphereCollisionOnly => "_connected_geometry_face_mode_sphere_collision_only",
            Self::Breakable => "_connected_geometry_face_mode_breakable",
            Self::LightmapOnly => "_connected_geometry_face_mode_lightmap_only",
        }
    }

    /// Modes that carry no render geometry.
    pub fn is_collision(self) -> bool {
        matches!(self, Self::CollisionOnly | Self::SphereCollisionOnly | Self::Breakable)
    }
}

/// Corinth instanced collision type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoopCollisionType {
    None,
    Default,
    InvisibleWall,
    PlayCollision,
    BulletCollision,
}

impl PoopCollisionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "_connected_geometry_poop_collision_type_none",
            Self::Default => "_connected_geometry_poop_collision_type_default",
            Self::InvisibleWall => "_connected_geometry_poop_collision_type_invisible_wall",
            Self::PlayCollision => "_connected_geometry_poop_collision_type_play_collision",
            Self::BulletCollision => "_connected_geometry_poop_collision_type_bullet_collision",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundarySurfaceType {
    SoftCeiling,
    SoftKill,
    SlipSurface,
}

impl BoundarySurfaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SoftCeiling => "_connected_geometry_boundary_surface_type_soft_ceiling",
            Self::SoftKill => "_connected_geometry_boundary_surface_type_soft_kill",
            Self::SlipSurface => "_connected_geometry_boundary_surface_type_slip_surface",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObbVolumeType {
    LightmapExclusion,
    Streaming,
}

impl ObbVolumeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LightmapExclusion => "_connected_geometry_mesh_obb_volume_type_lightmapexclusionvolume",
            Self::Streaming => "_connected_geometry_mesh_obb_volume_type_streamingvolume",
        }
    }
}

/// Resolved face sides value, e.g. `two_sided_transparent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FaceSides {
    pub two_sided: Option<TwoSidedKind>,
    pub transparent: bool,
}

impl FaceSides {
    pub fn two_sided() -> Self {
        Self {
            two_sided: Some(TwoSidedKind::TwoSided),
            transparent: false,
        }
    }

    pub fn as_string(self) -> String {
        let base = match self.two_sided {
            None => "one_sided",
            Some(TwoSidedKind::TwoSided) => "two_sided",
            Some(TwoSidedKind::Mirror) => "mirror",
            Some(TwoSidedKind::Keep) => "keep",
        };
        let suffix = if self.transparent { "_transparent" } else { "" };
        format!("_connected_geometry_face_sides_{}{}", base, suffix)
    }
}

/// Resolved emissive values, already converted to game units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissiveProps {
    pub power: f32,
    pub color: [f32; 4],
    /// Focus as a fraction of 180 degrees.
    pub focus: f32,
    /// Falloff and cutoff when attenuation is enabled.
    pub attenuation: Option<(f32, f32)>,
    pub per_unit: bool,
    pub quality: bool,
    pub use_shader_gel: bool,
    pub bounce_ratio: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightmapProps {
    pub additive_transparency: Option<[f32; 4]>,
    pub resolution_scale: Option<f32>,
    pub lightmap_type: Option<String>,
    pub translucency_tint: Option<[f32; 4]>,
    pub lighting_from_both_sides: bool,
}

impl LightmapProps {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Resolved per-mesh export properties.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MeshProps {
    pub face_mode: Option<FaceMode>,
    pub poop_collision: Option<PoopCollisionType>,
    pub face_sides: Option<FaceSides>,
    pub draw_distance: Option<DrawDistance>,
    pub global_material: Option<String>,
    pub ladder: bool,
    pub slip_surface: bool,
    pub decal_offset: bool,
    pub no_shadow: bool,
    pub precise_position: bool,
    pub additional_compression_off: bool,
    pub no_lightmap: bool,
    pub invisible_to_pvs: bool,
    pub lightmap: LightmapProps,
    pub emissive: Option<EmissiveProps>,
    pub boundary_surface: Option<BoundarySurfaceType>,
    pub obb_volume: Option<ObbVolumeType>,
    /// `{asset}_{bsp}` a seam faces.
    pub seam_associated_bsp: Option<String>,
    pub decorator_lod: Option<u8>,
    /// Corinth scenario structure is sky faced.
    pub sky_face: bool,
}

impl MeshProps {
    /// Whether faces with these props produce render geometry.
    pub fn renders(&self) -> bool {
        !matches!(self.face_mode, Some(mode) if mode.is_collision())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_sides_strings() {
        assert_eq!(
            FaceSides::two_sided().as_string(),
            "_connected_geometry_face_sides_two_sided"
        );
        let sides = FaceSides {
            two_sided: Some(TwoSidedKind::Mirror),
            transparent: true,
        };
        assert_eq!(sides.as_string(), "_connected_geometry_face_sides_mirror_transparent");
        let one = FaceSides {
            two_sided: None,
            transparent: true,
        };
        assert_eq!(one.as_string(), "_connected_geometry_face_sides_one_sided_transparent");
    }

    #[test]
    fn test_collision_modes_do_not_render() {
        let mut props = MeshProps::default();
        assert!(props.renders());
        props.face_mode = Some(FaceMode::SphereCollisionOnly);
        assert!(!props.renders());
        props.face_mode = Some(FaceMode::RenderOnly);
        assert!(props.renders());
    }

    #[test]
    fn test_overrides_parse_sparse_json() {
        let overrides: FaceOverrides =
            serde_json::from_str(r#"{ "collision": "render_only", "two_sided": "keep" }"#).unwrap();
        assert_eq!(overrides.collision, Some(CollisionOverride::RenderOnly));
        assert!(overrides.is_two_sided());
        assert!(!overrides.ladder);
    }
}
