//! Face-signature mesh splitting.
//!
//! Faces are grouped by the exact set of layers covering them. Every group
//! becomes one sub-mesh carrying the merged overrides of its layers, so each
//! face-level property ends up as a mesh-level one.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use log::debug;

use super::normals::{NormalBinding, NormalSource};
use super::overrides::{OverrideContext, PartProps};
use crate::error::SceneWarning;
use crate::scene::{CollisionOverride, FaceLayerStore, FaceMode, FaceSides, Mesh, MeshType};

/// Role of a produced part relative to the source object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartRole {
    Render,
    CollisionProxy,
    PhysicsProxy,
}

/// Faces sharing one layer signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureGroup {
    /// Layer indices, in layer order.
    pub layers: Vec<usize>,
    /// Source face indices, ascending.
    pub faces: Vec<u32>,
}

/// One mesh produced by partitioning.
#[derive(Debug, Clone)]
pub struct Part {
    /// Suffix appended to the owning object's name, in parentheses.
    pub label: Option<String>,
    pub role: PartRole,
    pub mesh: Arc<Mesh>,
    /// Source face indices covered by this part.
    pub faces: Vec<u32>,
    pub resolved: PartProps,
    pub normals: Option<NormalBinding>,
    /// Index of the part this proxy is parented to.
    pub parent: Option<usize>,
}

impl Part {
    /// Object name for an instance of this part.
    pub fn name_for(&self, object_name: &str) -> String {
        match &self.label {
            Some(label) => format!("{}({})", object_name, label),
            None => object_name.to_string(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }
}

/// Result of partitioning one mesh.
#[derive(Debug, Clone)]
pub struct Partition {
    /// True when the mesh was actually split.
    pub split: bool,
    pub groups: Vec<SignatureGroup>,
    pub parts: Vec<Part>,
    pub warnings: Vec<SceneWarning>,
}

impl Partition {
    pub fn render_parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().filter(|p| p.role == PartRole::Render)
    }
}

/// Splits meshes by face layer signature.
pub struct Partitioner {
    ctx: OverrideContext,
}

impl Partitioner {
    pub fn new(ctx: OverrideContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &OverrideContext {
        &self.ctx
    }

    /// Partition `mesh` using `layers`, starting from the object's `base`
    /// properties. `has_collision_child` suppresses collision proxy
    /// generation for instanced geometry that already has one.
    pub fn partition(
        &self,
        mesh: &Arc<Mesh>,
        layers: &FaceLayerStore,
        base: &PartProps,
        has_collision_child: bool,
    ) -> Partition {
        let face_count = mesh.face_count();
        let (sets, mut warnings) = layers.resolve(&mesh.name, face_count);

        if !is_split_justified(&sets, face_count) {
            let mut resolved = base.clone();
            for (layer, set) in layers.iter().zip(&sets) {
                if !set.is_empty() {
                    resolved.apply(&self.ctx, &layer.overrides, &mesh.name, &mut warnings);
                }
            }
            let all: Vec<u32> = (0..face_count as u32).collect();
            return Partition {
                split: false,
                groups: vec![SignatureGroup {
                    layers: non_empty_layers(&sets),
                    faces: all.clone(),
                }],
                parts: vec![Part {
                    label: None,
                    role: PartRole::Render,
                    mesh: Arc::clone(mesh),
                    faces: all,
                    resolved,
                    normals: None,
                    parent: None,
                }],
                warnings,
            };
        }

        let groups = signature_groups(&sets, face_count);
        debug!("Splitting {} into {} signature groups", mesh.name, groups.len());

        let builds_proxies = base.mesh_type == MeshType::Poop && !self.ctx.corinth && !has_collision_child;
        let mut base = base.clone();
        let mut collision_proxy = None;

        if builds_proxies {
            base.props.face_mode = Some(FaceMode::RenderOnly);

            let collision_only = faces_where(layers, &sets, |o| o.collision == Some(CollisionOverride::CollisionOnly));
            if collision_only.len() == face_count {
                base.props.face_mode = Some(FaceMode::CollisionOnly);
                let all: Vec<u32> = (0..face_count as u32).collect();
                return Partition {
                    split: false,
                    groups: vec![SignatureGroup {
                        layers: non_empty_layers(&sets),
                        faces: all.clone(),
                    }],
                    parts: vec![Part {
                        label: None,
                        role: PartRole::Render,
                        mesh: Arc::clone(mesh),
                        faces: all,
                        resolved: base,
                        normals: None,
                        parent: None,
                    }],
                    warnings,
                };
            }

            let excluded = faces_where(layers, &sets, |o| {
                o.breakable
                    || matches!(
                        o.collision,
                        Some(CollisionOverride::RenderOnly) | Some(CollisionOverride::SphereCollisionOnly)
                    )
            });
            let proxy_faces: Vec<u32> = (0..face_count as u32).filter(|f| !excluded.contains(f)).collect();
            if !proxy_faces.is_empty() {
                let two_sided = layers
                    .iter()
                    .zip(&sets)
                    .any(|(layer, set)| layer.overrides.is_two_sided() && proxy_faces.iter().any(|f| set.contains(f)));
                let mut resolved = base.clone();
                resolved.mesh_type = MeshType::PoopCollision;
                resolved.props.face_mode = None;
                if two_sided {
                    resolved.props.face_sides = Some(FaceSides::two_sided());
                }
                collision_proxy = Some(Part {
                    label: Some("collision".to_string()),
                    role: PartRole::CollisionProxy,
                    mesh: Arc::new(mesh.extract(&proxy_faces).mesh),
                    faces: proxy_faces,
                    resolved,
                    normals: None,
                    parent: None,
                });
            }
        }

        let source = NormalSource::new(Arc::clone(mesh));
        let mut parts: Vec<Part> = groups
            .iter()
            .map(|group| {
                let extracted = mesh.extract(&group.faces);
                let mut resolved = base.clone();
                let names: Vec<&str> = group
                    .layers
                    .iter()
                    .filter_map(|&i| layers.get(i))
                    .map(|layer| layer.name.as_str())
                    .collect();
                let label = (!names.is_empty()).then(|| names.join(", "));
                let warn_name = match &label {
                    Some(l) => format!("{}({})", mesh.name, l),
                    None => mesh.name.clone(),
                };
                for layer in group.layers.iter().filter_map(|&i| layers.get(i)) {
                    resolved.apply(&self.ctx, &layer.overrides, &warn_name, &mut warnings);
                }
                let normals = resolved.renders().then(|| source.bind(extracted.vertex_map));
                Part {
                    label,
                    role: PartRole::Render,
                    mesh: Arc::new(extracted.mesh),
                    faces: group.faces.clone(),
                    resolved,
                    normals,
                    parent: None,
                }
            })
            .collect();

        if builds_proxies {
            parts = attach_proxies(parts, collision_proxy, mesh);
        }

        parts.retain(|p| !p.faces.is_empty());

        Partition {
            split: true,
            groups,
            parts,
            warnings,
        }
    }
}

/// Splitting is needed when some layer covers part, but not all, of the mesh.
pub fn is_split_justified(sets: &[BTreeSet<u32>], face_count: usize) -> bool {
    sets.iter().any(|set| !set.is_empty() && set.len() != face_count)
}

/// Group faces by covering-layer signature, ordered by first face.
pub fn signature_groups(sets: &[BTreeSet<u32>], face_count: usize) -> Vec<SignatureGroup> {
    let mut index: HashMap<Vec<usize>, usize> = HashMap::new();
    let mut groups: Vec<SignatureGroup> = Vec::new();
    for face in 0..face_count as u32 {
        let signature: Vec<usize> = sets
            .iter()
            .enumerate()
            .filter(|(_, set)| set.contains(&face))
            .map(|(i, _)| i)
            .collect();
        let slot = *index.entry(signature.clone()).or_insert_with(|| {
            groups.push(SignatureGroup {
                layers: signature,
                faces: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].faces.push(face);
    }
    groups
}

fn non_empty_layers(sets: &[BTreeSet<u32>]) -> Vec<usize> {
    sets.iter()
        .enumerate()
        .filter(|(_, s)| !s.is_empty())
        .map(|(i, _)| i)
        .collect()
}

fn faces_where(
    layers: &FaceLayerStore,
    sets: &[BTreeSet<u32>],
    predicate: impl Fn(&crate::scene::FaceOverrides) -> bool,
) -> BTreeSet<u32> {
    layers
        .iter()
        .zip(sets)
        .filter(|(layer, _)| predicate(&layer.overrides))
        .flat_map(|(_, set)| set.iter().copied())
        .collect()
}

/// Legacy instanced geometry: drop collision-only parts (the collision proxy
/// covers them), merge sphere collision parts into one physics proxy, and
/// parent both proxies to the first part that still renders. No proxy is
/// ever left without a parent.
fn attach_proxies(parts: Vec<Part>, collision_proxy: Option<Part>, mesh: &Mesh) -> Vec<Part> {
    let (sphere, mut render): (Vec<Part>, Vec<Part>) = parts
        .into_iter()
        .filter(|p| p.resolved.props.face_mode != Some(FaceMode::CollisionOnly))
        .partition(|p| p.resolved.props.face_mode == Some(FaceMode::SphereCollisionOnly));

    let physics_proxy = sphere.first().map(|first| {
        let mut faces: Vec<u32> = sphere.iter().flat_map(|p| p.faces.iter().copied()).collect();
        faces.sort_unstable();
        let mut resolved = first.resolved.clone();
        resolved.props.face_sides = Some(FaceSides::two_sided());
        Part {
            label: Some("physics".to_string()),
            role: PartRole::PhysicsProxy,
            mesh: Arc::new(mesh.extract(&faces).mesh),
            faces,
            resolved,
            normals: None,
            parent: None,
        }
    });

    let parent = render.iter().position(|p| p.resolved.renders());

    // With nothing left to render, the collision proxy becomes the instance
    // and the physics proxy hangs off it instead.
    let mut owner = parent;
    let mut proxies = Vec::new();
    if let Some(mut proxy) = collision_proxy {
        match parent {
            Some(index) => proxy.parent = Some(index),
            None => {
                demote_to_collision(&mut proxy);
                owner = Some(render.len());
            }
        }
        proxies.push(proxy);
    }
    if let Some(mut proxy) = physics_proxy {
        match owner {
            Some(index) => proxy.parent = Some(index),
            None => demote_to_collision(&mut proxy),
        }
        proxies.push(proxy);
    }

    render.extend(proxies);
    render
}

fn demote_to_collision(part: &mut Part) {
    part.role = PartRole::Render;
    part.parent = None;
    part.resolved.mesh_type = MeshType::Poop;
    part.resolved.props.face_mode = Some(FaceMode::CollisionOnly);
}
