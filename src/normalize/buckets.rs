//! Export bucket assignment.

use serde::{Deserialize, Serialize};

use crate::scene::{AssetCategory, ExportKind, ExportObject, MeshType};

/// Which export job family an object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Render,
    Collision,
    Physics,
    Markers,
    Skeleton,
    Structure,
    Design,
    Lighting,
}

impl Bucket {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Collision => "collision",
            Self::Physics => "physics",
            Self::Markers => "markers",
            Self::Skeleton => "skeleton",
            Self::Structure => "structure",
            Self::Design => "design",
            Self::Lighting => "lighting",
        }
    }

    /// Buckets scoped by BSP rather than permutation alone.
    pub fn is_bsp_scoped(self) -> bool {
        matches!(self, Self::Structure | Self::Design)
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket for `object`, or `None` when the asset has no use for it.
pub fn assign_bucket(object: &ExportObject, category: AssetCategory, corinth: bool) -> Option<Bucket> {
    match object.kind {
        ExportKind::Light => {
            if category == AssetCategory::Sky && !corinth {
                None
            } else {
                Some(Bucket::Lighting)
            }
        }
        ExportKind::Frame => Some(if category.is_map() {
            Bucket::Structure
        } else {
            Bucket::Skeleton
        }),
        _ if category.is_map() => Some(match object.kind.mesh_type() {
            Some(mesh_type) if mesh_type.is_design() => Bucket::Design,
            _ => Bucket::Structure,
        }),
        ExportKind::Marker(_) => Some(Bucket::Markers),
        ExportKind::Mesh(mesh_type) => match mesh_type {
            MeshType::Default | MeshType::Decorator => Some(Bucket::Render),
            MeshType::Collision => Some(Bucket::Collision),
            MeshType::Physics => Some(Bucket::Physics),
            MeshType::ObjectInstance => Some(Bucket::Markers),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MarkerType;
    use test_case::test_case;

    #[test_case(ExportKind::Mesh(MeshType::Default), AssetCategory::Model => Some(Bucket::Render))]
    #[test_case(ExportKind::Mesh(MeshType::Decorator), AssetCategory::DecoratorSet => Some(Bucket::Render))]
    #[test_case(ExportKind::Mesh(MeshType::Collision), AssetCategory::Model => Some(Bucket::Collision))]
    #[test_case(ExportKind::Mesh(MeshType::ObjectInstance), AssetCategory::Model => Some(Bucket::Markers))]
    #[test_case(ExportKind::Mesh(MeshType::Poop), AssetCategory::Model => None)]
    #[test_case(ExportKind::Marker(MarkerType::Hint), AssetCategory::Model => Some(Bucket::Markers))]
    #[test_case(ExportKind::Mesh(MeshType::Poop), AssetCategory::Scenario => Some(Bucket::Structure))]
    #[test_case(ExportKind::Mesh(MeshType::PlanarFogVolume), AssetCategory::Scenario => Some(Bucket::Design))]
    #[test_case(ExportKind::Marker(MarkerType::GameInstance), AssetCategory::Prefab => Some(Bucket::Structure))]
    #[test_case(ExportKind::Frame, AssetCategory::Animation => Some(Bucket::Skeleton))]
    #[test_case(ExportKind::Light, AssetCategory::Scenario => Some(Bucket::Lighting))]
    #[test_case(ExportKind::Light, AssetCategory::Sky => None)]
    fn test_assign_bucket_legacy(kind: ExportKind, category: AssetCategory) -> Option<Bucket> {
        assign_bucket(&ExportObject::new("o", kind), category, false)
    }

    #[test]
    fn test_corinth_sky_keeps_lights() {
        let light = ExportObject::new("sun", ExportKind::Light);
        assert_eq!(assign_bucket(&light, AssetCategory::Sky, true), Some(Bucket::Lighting));
    }
}
