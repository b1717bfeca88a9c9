//! Applying face overrides onto resolved mesh properties.

use crate::error::SceneWarning;
use crate::scene::{
    AssetCategory, CollisionOverride, EmissiveProps, FaceMode, FaceOverrides, FaceSides, MeshProps, MeshType,
    PoopCollisionType, TwoSidedKind,
};

/// Feet-to-game-unit scale applied to emissive attenuation distances.
const ATTENUATION_SCALE: f32 = 100.0 * 0.03048;

/// Corinth emissive power is authored 30x brighter than the game expects.
const CORINTH_POWER_DIVISOR: f32 = 30.0;

/// What overrides are resolved against.
#[derive(Debug, Clone)]
pub struct OverrideContext {
    pub corinth: bool,
    pub category: AssetCategory,
    /// Valid region (or BSP) names, first is the default.
    pub regions: Vec<String>,
}

impl OverrideContext {
    pub fn default_region(&self) -> &str {
        self.regions.first().map(String::as_str).unwrap_or("default")
    }

    fn table_name(&self) -> &'static str {
        if self.category.is_map() {
            "BSP"
        } else {
            "region"
        }
    }
}

/// Mesh type, properties and region override of one mesh or sub-mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct PartProps {
    pub mesh_type: MeshType,
    pub props: MeshProps,
    pub region: Option<String>,
}

impl PartProps {
    pub fn new(mesh_type: MeshType, props: MeshProps) -> Self {
        Self {
            mesh_type,
            props,
            region: None,
        }
    }

    pub fn renders(&self) -> bool {
        self.mesh_type != MeshType::PoopCollision && self.props.renders()
    }

    /// Apply one override set. `label` names the object in warnings.
    pub fn apply(
        &mut self,
        ctx: &OverrideContext,
        overrides: &FaceOverrides,
        label: &str,
        warnings: &mut Vec<SceneWarning>,
    ) {
        self.apply_collision(ctx, overrides);

        if !ctx.corinth && overrides.breakable {
            self.props.face_mode = Some(FaceMode::Breakable);
        }

        let is_render = self.mesh_type.is_render(ctx.corinth, ctx.category);

        if let Some(distance) = overrides.draw_distance {
            if is_render && matches!(ctx.category, AssetCategory::Model | AssetCategory::Sky) {
                self.props.draw_distance = Some(distance);
            }
        }

        let transparent = overrides.transparent && is_render;
        if let Some(kind) = overrides.two_sided {
            let kind = if ctx.corinth && is_render {
                kind
            } else {
                TwoSidedKind::TwoSided
            };
            self.props.face_sides = Some(FaceSides {
                two_sided: Some(kind),
                transparent,
            });
        } else if transparent {
            self.props.face_sides = Some(FaceSides {
                two_sided: None,
                transparent: true,
            });
        }

        if let Some(region) = &overrides.region {
            if ctx.regions.iter().any(|r| r == region) {
                self.region = Some(region.clone());
            } else {
                warnings.push(SceneWarning::UnknownTableEntry {
                    object: label.to_string(),
                    table: ctx.table_name(),
                    name: region.clone(),
                });
                self.region = Some(ctx.default_region().to_string());
            }
        }

        if let Some(material) = &overrides.global_material {
            let material = normalize_global_material(material);
            if !material.is_empty() {
                self.props.global_material = Some(material);
            }
        }

        self.props.ladder |= overrides.ladder;
        self.props.slip_surface |= overrides.slip_surface;
        self.props.decal_offset |= overrides.decal_offset;
        self.props.no_shadow |= overrides.no_shadow;
        if overrides.precise_position {
            self.props.precise_position = true;
            self.props.additional_compression_off = true;
        }
        self.props.no_lightmap |= overrides.no_lightmap;
        self.props.invisible_to_pvs |= overrides.no_pvs;

        let lightmap = &mut self.props.lightmap;
        if overrides.lightmap_additive_transparency.is_some() {
            lightmap.additive_transparency = overrides.lightmap_additive_transparency;
        }
        if overrides.lightmap_resolution_scale.is_some() {
            lightmap.resolution_scale = overrides.lightmap_resolution_scale;
        }
        if overrides.lightmap_type.is_some() {
            lightmap.lightmap_type = overrides.lightmap_type.clone();
        }
        if overrides.lightmap_translucency_tint.is_some() {
            lightmap.translucency_tint = overrides.lightmap_translucency_tint;
        }
        lightmap.lighting_from_both_sides |= overrides.lightmap_both_sides;

        if let Some(emissive) = &overrides.emissive {
            let power = if ctx.corinth {
                emissive.power / CORINTH_POWER_DIVISOR
            } else {
                emissive.power
            };
            let attenuation = (emissive.attenuation_falloff != 0.0 || emissive.attenuation_cutoff != 0.0).then(|| {
                (
                    emissive.attenuation_falloff * ATTENUATION_SCALE,
                    emissive.attenuation_cutoff * ATTENUATION_SCALE,
                )
            });
            self.props.emissive = Some(EmissiveProps {
                power,
                color: emissive.color,
                focus: emissive.focus.to_degrees() / 180.0,
                attenuation,
                per_unit: emissive.per_unit,
                quality: emissive.quality,
                use_shader_gel: emissive.use_shader_gel,
                bounce_ratio: emissive.bounce_ratio,
            });
        }
    }

    fn apply_collision(&mut self, ctx: &OverrideContext, overrides: &FaceOverrides) {
        let Some(collision) = overrides.collision else {
            return;
        };
        match (collision, ctx.corinth) {
            (CollisionOverride::RenderOnly, true) => {
                self.props.poop_collision = Some(PoopCollisionType::None);
            }
            (CollisionOverride::RenderOnly, false) => {
                self.props.face_mode = Some(FaceMode::RenderOnly);
            }
            (CollisionOverride::CollisionOnly, true) => {
                self.mesh_type = MeshType::PoopCollision;
                self.props.poop_collision = Some(PoopCollisionType::Default);
            }
            (CollisionOverride::CollisionOnly, false) => {
                self.props.face_mode = Some(FaceMode::CollisionOnly);
            }
            (CollisionOverride::SphereCollisionOnly, true) => {
                self.mesh_type = MeshType::PoopCollision;
                self.props.poop_collision = Some(PoopCollisionType::InvisibleWall);
            }
            (CollisionOverride::SphereCollisionOnly, false) => {
                self.props.face_mode = Some(FaceMode::SphereCollisionOnly);
            }
            (CollisionOverride::PlayerCollisionOnly, true) => {
                self.mesh_type = MeshType::PoopCollision;
                self.props.poop_collision = Some(PoopCollisionType::PlayCollision);
            }
            (CollisionOverride::BulletCollisionOnly, true) => {
                self.mesh_type = MeshType::PoopCollision;
                self.props.poop_collision = Some(PoopCollisionType::BulletCollision);
            }
            // player and bullet collision do not exist on the legacy target
            (CollisionOverride::PlayerCollisionOnly, false) | (CollisionOverride::BulletCollisionOnly, false) => {}
        }
    }
}

/// Global material names may not contain spaces.
pub fn normalize_global_material(name: &str) -> String {
    name.trim().replace(' ', "_")
}
