//! Partition Tests
//!
//! Face conservation and signature properties of the mesh partitioner.

use std::collections::BTreeSet;
use std::sync::Arc;

use glam::Vec3;
use tagforge::partition::{OverrideContext, PartProps, Partitioner};
use tagforge::scene::{
    AssetCategory, CollisionOverride, Face, FaceLayer, FaceLayerStore, FaceOverrides, Mesh, MeshProps, MeshType,
};

/// A row of `count` unit quads.
fn strip(count: u32) -> Arc<Mesh> {
    let mut positions = Vec::new();
    for i in 0..=count {
        positions.push(Vec3::new(i as f32, 0.0, 0.0));
        positions.push(Vec3::new(i as f32, 1.0, 0.0));
    }
    Arc::new(Mesh {
        name: "strip".into(),
        positions,
        uvs: Vec::new(),
        faces: (0..count)
            .map(|i| Face::new(vec![2 * i, 2 * i + 2, 2 * i + 3, 2 * i + 1]))
            .collect(),
        materials: vec![Some("concrete".into())],
    })
}

fn partitioner(category: AssetCategory, corinth: bool) -> Partitioner {
    Partitioner::new(OverrideContext {
        corinth,
        category,
        regions: vec!["default".into(), "hull".into()],
    })
}

fn render_base() -> PartProps {
    PartProps::new(MeshType::Default, MeshProps::default())
}

fn store(layers: Vec<FaceLayer>) -> FaceLayerStore {
    let mut store = FaceLayerStore::new();
    for layer in layers {
        store.push(layer);
    }
    store
}

#[test]
fn test_two_halves_split_into_two_parts() {
    let mesh = strip(10);
    let layers = store(vec![FaceLayer::new("A", 0..5), FaceLayer::new("B", 5..10)]);
    let partition = partitioner(AssetCategory::Model, false).partition(&mesh, &layers, &render_base(), false);

    assert!(partition.split);
    assert_eq!(partition.parts.len(), 2);
    assert!(partition.parts.iter().all(|p| p.face_count() == 5));
    assert!(partition.parts.iter().all(|p| p.mesh.face_count() == 5));
    let a: BTreeSet<u32> = partition.parts[0].faces.iter().copied().collect();
    let b: BTreeSet<u32> = partition.parts[1].faces.iter().copied().collect();
    assert!(a.is_disjoint(&b));
    assert_eq!(partition.parts[0].name_for("wall"), "wall(A)");
}

#[test]
fn test_full_cover_layer_keeps_topology() {
    let mesh = strip(10);
    let overrides = FaceOverrides {
        ladder: true,
        ..Default::default()
    };
    let layers = store(vec![FaceLayer::new("climb", 0..10).with_overrides(overrides)]);
    let partition = partitioner(AssetCategory::Model, false).partition(&mesh, &layers, &render_base(), false);

    assert!(!partition.split);
    assert_eq!(partition.parts.len(), 1);
    assert!(Arc::ptr_eq(&partition.parts[0].mesh, &mesh));
    assert!(partition.parts[0].resolved.props.ladder);
}

#[test]
fn test_faces_are_conserved_for_overlapping_layers() {
    let mesh = strip(12);
    let layers = store(vec![
        FaceLayer::new("a", 0..8),
        FaceLayer::new("b", 4..12),
        FaceLayer::new("c", [1, 5, 9]),
    ]);
    let partition = partitioner(AssetCategory::Model, false).partition(&mesh, &layers, &render_base(), false);

    let total: usize = partition.parts.iter().map(|p| p.face_count()).sum();
    assert_eq!(total, 12);

    let mut seen = BTreeSet::new();
    for part in &partition.parts {
        for face in &part.faces {
            assert!(seen.insert(*face), "face {} appears in two parts", face);
        }
    }
    assert_eq!(partition.parts.len(), partition.groups.len());
}

#[test]
fn test_repartition_matches_signature_count() {
    let mesh = strip(9);
    let layers = store(vec![
        FaceLayer::new("x", 0..3),
        FaceLayer::new("y", 3..6),
        FaceLayer::new("z", 6..9),
    ]);
    let partition = partitioner(AssetCategory::Model, false).partition(&mesh, &layers, &render_base(), false);
    assert_eq!(partition.parts.len(), 3);
}

#[test]
fn test_instance_collision_proxy() {
    let mesh = strip(6);
    let render_only = FaceOverrides {
        collision: Some(CollisionOverride::RenderOnly),
        ..Default::default()
    };
    let layers = store(vec![FaceLayer::new("glass", 0..2).with_overrides(render_only)]);
    let base = PartProps::new(MeshType::Poop, MeshProps::default());
    let partition = partitioner(AssetCategory::Scenario, false).partition(&mesh, &layers, &base, false);

    let proxy = partition
        .parts
        .iter()
        .find(|p| p.resolved.mesh_type == MeshType::PoopCollision)
        .expect("collision proxy");
    assert_eq!(proxy.faces, vec![2, 3, 4, 5]);
    assert!(proxy.parent.is_some());
}
