//! Authored kind to export kind classification.
//!
//! Two tables keyed by the authored kind: where it may appear (asset
//! categories and targets), and what it becomes per category. Both are
//! exhaustive matches so a new kind cannot be forgotten.

use crate::scene::{
    AssetCategory, BoundarySurfaceType, ExportKind, FaceMode, MarkerType, MeshType, ObbVolumeType,
    PoopCollisionType, RawKind, RawMarkerKind, RawMeshKind,
};

use AssetCategory::*;

/// Where an authored kind is allowed.
#[derive(Debug, Clone, Copy)]
pub struct Validity {
    pub categories: &'static [AssetCategory],
    pub legacy: bool,
    pub corinth: bool,
}

const ALL: &[AssetCategory] = &[Model, Scenario, Sky, ParticleModel, DecoratorSet, Animation, Prefab];
const MODEL: &[AssetCategory] = &[Model];
const SCENARIO: &[AssetCategory] = &[Scenario];
const MAPS: &[AssetCategory] = &[Scenario, Prefab];

const fn both(categories: &'static [AssetCategory]) -> Validity {
    Validity {
        categories,
        legacy: true,
        corinth: true,
    }
}

const fn legacy_only(categories: &'static [AssetCategory]) -> Validity {
    Validity {
        categories,
        legacy: true,
        corinth: false,
    }
}

const fn corinth_only(categories: &'static [AssetCategory]) -> Validity {
    Validity {
        categories,
        legacy: false,
        corinth: true,
    }
}

pub fn validity(kind: RawKind) -> Validity {
    match kind {
        RawKind::Mesh(mesh) => match mesh {
            RawMeshKind::Default => both(ALL),
            RawMeshKind::Collision | RawMeshKind::Physics | RawMeshKind::ObjectInstance => both(MODEL),
            RawMeshKind::Structure => both(SCENARIO),
            RawMeshKind::Instance => both(MAPS),
            RawMeshKind::Seam
            | RawMeshKind::Portal
            | RawMeshKind::WaterSurface
            | RawMeshKind::WaterPhysicsVolume
            | RawMeshKind::SoftCeiling
            | RawMeshKind::SoftKill
            | RawMeshKind::SlipSurface
            | RawMeshKind::LightmapOnly => both(SCENARIO),
            RawMeshKind::RainSheet | RawMeshKind::RainBlocker | RawMeshKind::FogVolume | RawMeshKind::CookieCutter => {
                legacy_only(SCENARIO)
            }
            RawMeshKind::LightmapExclude | RawMeshKind::Streaming => corinth_only(SCENARIO),
        },
        RawKind::Marker(marker) => match marker {
            RawMarkerKind::Model => both(&[Model, Scenario, Sky, Animation, Prefab]),
            RawMarkerKind::Effects => both(&[Model, Sky]),
            RawMarkerKind::Garbage
            | RawMarkerKind::Hint
            | RawMarkerKind::PathfindingSphere
            | RawMarkerKind::PhysicsConstraint
            | RawMarkerKind::Target => both(MODEL),
            RawMarkerKind::GameInstance => both(MAPS),
            RawMarkerKind::Airprobe | RawMarkerKind::Envfx | RawMarkerKind::LightCone => corinth_only(MAPS),
        },
    }
}

/// Whether `kind` may be exported in `category` for the target.
pub fn is_valid(kind: RawKind, category: AssetCategory, corinth: bool) -> bool {
    let v = validity(kind);
    let target_ok = if corinth { v.corinth } else { v.legacy };
    // collision authored in a map becomes instanced collision
    let map_collision = kind == RawKind::Mesh(RawMeshKind::Collision) && category.is_map();
    target_ok && (v.categories.contains(&category) || map_collision)
}

/// Export kind plus the properties classification implies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classified {
    pub kind: ExportKind,
    pub face_mode: Option<FaceMode>,
    pub poop_collision: Option<PoopCollisionType>,
    pub boundary_surface: Option<BoundarySurfaceType>,
    pub obb_volume: Option<ObbVolumeType>,
    pub sky_face: bool,
}

impl Classified {
    fn mesh(mesh_type: MeshType) -> Self {
        Self {
            kind: ExportKind::Mesh(mesh_type),
            face_mode: None,
            poop_collision: None,
            boundary_surface: None,
            obb_volume: None,
            sky_face: false,
        }
    }

    fn with_face_mode(mut self, mode: FaceMode) -> Self {
        self.face_mode = Some(mode);
        self
    }

    pub fn mesh_type(&self) -> Option<MeshType> {
        self.kind.mesh_type()
    }
}

/// Map an authored kind to its export kind for `category`.
pub fn classify(kind: RawKind, category: AssetCategory, corinth: bool) -> Classified {
    let mesh = match kind {
        RawKind::Marker(marker) => {
            return Classified {
                kind: ExportKind::Marker(MarkerType::from(marker)),
                ..Classified::mesh(MeshType::Default)
            }
        }
        RawKind::Mesh(mesh) => mesh,
    };
    match (mesh, category) {
        (RawMeshKind::Default, Scenario | Prefab) => Classified::mesh(MeshType::Poop),
        (RawMeshKind::Default, DecoratorSet) => Classified::mesh(MeshType::Decorator),
        (RawMeshKind::Default, _) => Classified::mesh(MeshType::Default),
        (RawMeshKind::Structure, _) => Classified {
            sky_face: corinth,
            ..Classified::mesh(MeshType::Default)
        },
        (RawMeshKind::Instance, _) => Classified::mesh(MeshType::Poop),
        (RawMeshKind::Collision, Scenario | Prefab) if corinth => Classified {
            poop_collision: Some(PoopCollisionType::Default),
            ..Classified::mesh(MeshType::PoopCollision)
        },
        (RawMeshKind::Collision, Scenario | Prefab) => {
            Classified::mesh(MeshType::Poop).with_face_mode(FaceMode::CollisionOnly)
        }
        (RawMeshKind::Collision, _) => Classified::mesh(MeshType::Collision),
        (RawMeshKind::Physics, _) => Classified::mesh(MeshType::Physics),
        (RawMeshKind::ObjectInstance, _) => Classified::mesh(MeshType::ObjectInstance),
        (RawMeshKind::Seam, _) => Classified::mesh(MeshType::Seam),
        (RawMeshKind::Portal, _) => Classified::mesh(MeshType::Portal),
        (RawMeshKind::WaterSurface, _) => Classified::mesh(MeshType::WaterSurface),
        (RawMeshKind::WaterPhysicsVolume, _) => Classified::mesh(MeshType::WaterPhysicsVolume),
        (RawMeshKind::RainSheet, _) => {
            Classified::mesh(MeshType::PoopVerticalRainSheet).with_face_mode(FaceMode::RenderOnly)
        }
        (RawMeshKind::RainBlocker, _) => {
            Classified::mesh(MeshType::PoopRainBlocker).with_face_mode(FaceMode::RenderOnly)
        }
        (RawMeshKind::FogVolume, _) => Classified::mesh(MeshType::PlanarFogVolume),
        (RawMeshKind::SoftCeiling, _) => boundary(BoundarySurfaceType::SoftCeiling),
        (RawMeshKind::SoftKill, _) => boundary(BoundarySurfaceType::SoftKill),
        (RawMeshKind::SlipSurface, _) => boundary(BoundarySurfaceType::SlipSurface),
        (RawMeshKind::LightmapOnly, _) => Classified::mesh(MeshType::Poop).with_face_mode(FaceMode::LightmapOnly),
        (RawMeshKind::LightmapExclude, _) => obb(ObbVolumeType::LightmapExclusion),
        (RawMeshKind::Streaming, _) => obb(ObbVolumeType::Streaming),
        (RawMeshKind::CookieCutter, _) => Classified::mesh(MeshType::CookieCutter),
    }
}

fn boundary(kind: BoundarySurfaceType) -> Classified {
    Classified {
        boundary_surface: Some(kind),
        ..Classified::mesh(MeshType::BoundarySurface)
    }
}

fn obb(kind: ObbVolumeType) -> Classified {
    Classified {
        obb_volume: Some(kind),
        ..Classified::mesh(MeshType::ObbVolume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(RawKind::Mesh(RawMeshKind::Default), Model, false => true)]
    #[test_case(RawKind::Mesh(RawMeshKind::Structure), Model, false => false)]
    #[test_case(RawKind::Mesh(RawMeshKind::Collision), Scenario, true => true)]
    #[test_case(RawKind::Mesh(RawMeshKind::Collision), Sky, false => false)]
    #[test_case(RawKind::Mesh(RawMeshKind::FogVolume), Scenario, false => true)]
    #[test_case(RawKind::Mesh(RawMeshKind::FogVolume), Scenario, true => false)]
    #[test_case(RawKind::Mesh(RawMeshKind::Streaming), Scenario, false => false)]
    #[test_case(RawKind::Mesh(RawMeshKind::Streaming), Scenario, true => true)]
    #[test_case(RawKind::Marker(RawMarkerKind::Airprobe), Prefab, true => true)]
    #[test_case(RawKind::Marker(RawMarkerKind::Airprobe), Prefab, false => false)]
    #[test_case(RawKind::Marker(RawMarkerKind::Hint), Scenario, false => false)]
    fn test_validity(kind: RawKind, category: AssetCategory, corinth: bool) -> bool {
        is_valid(kind, category, corinth)
    }

    #[test_case(RawMeshKind::Default, Scenario, MeshType::Poop)]
    #[test_case(RawMeshKind::Default, Prefab, MeshType::Poop)]
    #[test_case(RawMeshKind::Default, DecoratorSet, MeshType::Decorator)]
    #[test_case(RawMeshKind::Default, Model, MeshType::Default)]
    #[test_case(RawMeshKind::Structure, Scenario, MeshType::Default)]
    #[test_case(RawMeshKind::SoftKill, Scenario, MeshType::BoundarySurface)]
    #[test_case(RawMeshKind::LightmapExclude, Scenario, MeshType::ObbVolume)]
    #[test_case(RawMeshKind::Collision, Model, MeshType::Collision)]
    fn test_mesh_mapping(raw: RawMeshKind, category: AssetCategory, expected: MeshType) {
        assert_eq!(classify(RawKind::Mesh(raw), category, false).mesh_type(), Some(expected));
    }

    #[test]
    fn test_map_collision_depends_on_target() {
        let legacy = classify(RawKind::Mesh(RawMeshKind::Collision), Scenario, false);
        assert_eq!(legacy.mesh_type(), Some(MeshType::Poop));
        assert_eq!(legacy.face_mode, Some(FaceMode::CollisionOnly));

        let corinth = classify(RawKind::Mesh(RawMeshKind::Collision), Scenario, true);
        assert_eq!(corinth.mesh_type(), Some(MeshType::PoopCollision));
        assert_eq!(corinth.poop_collision, Some(PoopCollisionType::Default));
    }

    #[test]
    fn test_corinth_structure_is_sky_faced() {
        assert!(classify(RawKind::Mesh(RawMeshKind::Structure), Scenario, true).sky_face);
        assert!(!classify(RawKind::Mesh(RawMeshKind::Structure), Scenario, false).sky_face);
    }

    #[test]
    fn test_markers_keep_type() {
        let c = classify(RawKind::Marker(RawMarkerKind::LightCone), Scenario, true);
        assert_eq!(c.kind, ExportKind::Marker(MarkerType::LightCone));
    }
}
