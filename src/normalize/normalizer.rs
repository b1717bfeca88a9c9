//! Scene normalization: one pass from the authored snapshot to classified,
//! partitioned, bucketed export objects.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use glam::{Vec2, Vec3};
use log::{debug, info, warn};

use super::buckets::{assign_bucket, Bucket};
use super::classify::{classify, is_valid, Classified};
use super::naming::{pad_protected, strip_prefix};
use super::seams::{build_seams, SeamSource};
use super::skeleton::Skeleton;
use crate::config::Target;
use crate::error::{ForgeError, Result, SceneWarning};
use crate::partition::{OverrideContext, PartProps, Partition, Partitioner};
use crate::scene::{
    AnimationClip, AssetCategory, AssetInfo, ExportKind, ExportObject, Face, FaceLayerStore, FaceMode, Mesh,
    MeshProps, MeshType, ObjectKind, RawKind, RawMeshKind, RegionEntry, SceneObject, SceneSnapshot, DEFAULT_NAME,
};

/// Placeholder assigned to empty material slots.
pub const INVALID_MATERIAL: &str = "+invalid";

/// Lowest decorator level of detail.
pub const MAX_DECORATOR_LOD: u8 = 4;

/// Name of the render mesh added to animation assets without geometry.
pub const NULL_RENDER: &str = "null";

/// An export object and the bucket it was sorted into.
#[derive(Debug, Clone)]
pub struct BucketedObject {
    pub bucket: Bucket,
    pub object: ExportObject,
}

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone)]
pub struct NormalizedScene {
    pub asset: AssetInfo,
    pub source: PathBuf,
    pub corinth: bool,
    /// Regions (BSPs for maps) still referenced by an object, in table order.
    pub regions: Vec<RegionEntry>,
    /// Permutations still referenced by an object, in table order.
    pub permutations: Vec<String>,
    pub objects: Vec<BucketedObject>,
    pub skeleton: Skeleton,
    pub animations: Vec<AnimationClip>,
    /// `default` first, then every global material in first-seen order.
    pub global_materials: Vec<String>,
    pub decorator_lods: BTreeSet<u8>,
    pub warnings: Vec<SceneWarning>,
}

impl NormalizedScene {
    pub fn category(&self) -> AssetCategory {
        self.asset.category
    }

    pub fn objects_in(&self, bucket: Bucket) -> impl Iterator<Item = &ExportObject> {
        self.objects
            .iter()
            .filter(move |o| o.bucket == bucket)
            .map(|o| &o.object)
    }

    pub fn has_bucket(&self, bucket: Bucket) -> bool {
        self.objects.iter().any(|o| o.bucket == bucket)
    }

    /// Permutations with at least one object in `bucket`, in table order.
    pub fn permutations_in(&self, bucket: Bucket) -> Vec<String> {
        let used: HashSet<&str> = self.objects_in(bucket).map(|o| o.permutation.as_str()).collect();
        self.permutations
            .iter()
            .filter(|p| used.contains(p.as_str()))
            .cloned()
            .collect()
    }

    /// BSPs with at least one object in `bucket`, in table order.
    pub fn bsps_in(&self, bucket: Bucket) -> Vec<String> {
        let used: HashSet<&str> = self.objects_in(bucket).filter_map(|o| o.bsp.as_deref()).collect();
        self.regions
            .iter()
            .filter(|r| used.contains(r.name.as_str()))
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn region_names(&self) -> Vec<String> {
        self.regions.iter().map(|r| r.name.clone()).collect()
    }

    pub fn global_material_index(&self, name: &str) -> Option<usize> {
        self.global_materials.iter().position(|m| m == name)
    }

    /// Animation clips flagged for export.
    pub fn exported_animations(&self) -> impl Iterator<Item = &AnimationClip> {
        self.animations.iter().filter(|a| a.export)
    }
}

/// An object waiting for partitioning.
struct Pending {
    object: ExportObject,
    mesh_index: Option<usize>,
    base: PartProps,
    partitioned: bool,
    has_collision_child: bool,
}

/// Partitions already computed, keyed by what the result depends on.
#[derive(Default)]
struct PartitionCache {
    entries: Vec<(usize, bool, PartProps, Arc<Partition>)>,
}

impl PartitionCache {
    fn get_or_partition(
        &mut self,
        partitioner: &Partitioner,
        mesh_index: usize,
        mesh: &Arc<Mesh>,
        layers: &FaceLayerStore,
        base: &PartProps,
        has_collision_child: bool,
        warnings: &mut Vec<SceneWarning>,
    ) -> Arc<Partition> {
        if let Some((_, _, _, partition)) = self
            .entries
            .iter()
            .find(|(index, child, props, _)| *index == mesh_index && *child == has_collision_child && props == base)
        {
            return Arc::clone(partition);
        }
        let partition = Arc::new(partitioner.partition(mesh, layers, base, has_collision_child));
        warnings.extend(partition.warnings.iter().cloned());
        self.entries
            .push((mesh_index, has_collision_child, base.clone(), Arc::clone(&partition)));
        partition
    }
}

/// Turns a [`SceneSnapshot`] into a [`NormalizedScene`].
pub struct Normalizer {
    target: Target,
}

impl Normalizer {
    pub fn new(target: Target) -> Self {
        Self { target }
    }

    pub fn normalize(&self, scene: SceneSnapshot) -> Result<NormalizedScene> {
        let corinth = self.target.is_corinth();
        let category = scene.asset.category;
        let is_map = category.is_map();
        let mut warnings = Vec::new();

        let skeleton = Skeleton::resolve(scene.armature.as_ref(), corinth)?;
        let renames = rename_objects(&scene.objects, &skeleton);

        let region_names = scene.region_names();
        let ctx = OverrideContext {
            corinth,
            category,
            regions: region_names.clone(),
        };
        let partitioner = Partitioner::new(ctx);

        let collision_parents: HashSet<&str> = scene
            .objects
            .iter()
            .filter(|o| {
                matches!(
                    o.kind,
                    ObjectKind::Mesh {
                        mesh_type: RawMeshKind::Collision,
                        ..
                    }
                )
            })
            .filter_map(|o| o.parent.as_deref())
            .collect();

        let meshes: Vec<Arc<Mesh>> = scene.meshes.iter().map(|m| Arc::new(m.geometry.clone())).collect();

        let mut pending = Vec::new();
        let mut seam_sources = Vec::new();

        for source in scene.objects.iter().filter(|o| o.exportable) {
            let name = renames[&source.name].clone();

            let classified = match raw_kind(source) {
                Some(raw) => {
                    if !is_valid(raw, category, corinth) {
                        warnings.push(SceneWarning::InvalidType {
                            object: name,
                            kind: raw.to_string(),
                            category: category.to_string(),
                        });
                        continue;
                    }
                    Some(classify(raw, category, corinth))
                }
                None => None,
            };

            if let Some(index) = source.mesh_index() {
                if meshes[index].is_empty() {
                    warnings.push(SceneWarning::EmptyMesh { object: name });
                    continue;
                }
            }

            let mut object = ExportObject::new(name.clone(), export_kind(source, classified.as_ref()));
            object.parent = source.parent.as_ref().and_then(|p| renames.get(p)).cloned();
            object.parent_bone = source.parent_bone.clone();
            object.transform = source.transform;
            object.mesh = source.mesh_index().map(|i| Arc::clone(&meshes[i]));
            match &source.kind {
                ObjectKind::Marker { game_instance_tag, .. } => object.game_instance_tag = game_instance_tag.clone(),
                ObjectKind::Light { light } => object.light = Some(light.clone()),
                _ => {}
            }

            if category.supports_regions() {
                let permutation = resolve_table_entry(
                    source.permutation.as_deref(),
                    &scene.permutations,
                    &name,
                    "permutation",
                    &mut warnings,
                );
                let region = resolve_table_entry(
                    source.region.as_deref(),
                    &region_names,
                    &name,
                    if is_map { "BSP" } else { "region" },
                    &mut warnings,
                );
                object.permutation = permutation;
                if is_map {
                    object.bsp = Some(region);
                } else {
                    object.region = region;
                }
            }

            let mut base = PartProps::new(MeshType::Default, MeshProps::default());
            if let Some(classified) = &classified {
                base = base_props(classified, source, category, &mut warnings);
                if !corinth && is_map && is_instance_collision(source, &scene) {
                    base.mesh_type = MeshType::PoopCollision;
                    base.props.face_mode = None;
                }
                if object.kind.is_mesh() {
                    base.apply(partitioner.context(), &source.overrides, &name, &mut warnings);
                }
                object.kind = match object.kind {
                    ExportKind::Mesh(_) => ExportKind::Mesh(base.mesh_type),
                    other => other,
                };
                object.props = base.props.clone();
            }

            if matches!(
                source.kind,
                ObjectKind::Mesh {
                    mesh_type: RawMeshKind::Seam,
                    ..
                }
            ) {
                seam_sources.push(SeamSource {
                    name: name.clone(),
                    seam_back: source.seam_back.clone(),
                    manual: source.seam_back_manual,
                });
            }

            let partitioned = classified
                .as_ref()
                .is_some_and(|c| is_partition_eligible(c, corinth, category));
            let has_collision_child = collision_parents.contains(source.name.as_str());

            if corinth
                && category == AssetCategory::Scenario
                && source.proxy_instance
                && matches!(
                    source.kind,
                    ObjectKind::Mesh {
                        mesh_type: RawMeshKind::Structure,
                        ..
                    }
                )
            {
                let mut instance = object.clone();
                instance.name = format!("{}(instance)", name);
                instance.kind = ExportKind::Mesh(MeshType::Poop);
                instance.props.sky_face = false;
                let mut instance_base = base.clone();
                instance_base.mesh_type = MeshType::Poop;
                instance_base.props.sky_face = false;
                pending.push(Pending {
                    object: instance,
                    mesh_index: source.mesh_index(),
                    base: instance_base,
                    partitioned: true,
                    has_collision_child,
                });
            }

            pending.push(Pending {
                object,
                mesh_index: source.mesh_index(),
                base,
                partitioned,
                has_collision_child,
            });
        }

        let mut objects = Vec::new();
        let mut cache = PartitionCache::default();
        for item in pending {
            match item.mesh_index {
                Some(index) if item.partitioned && !scene.meshes[index].layers.is_empty() => {
                    let partition = cache.get_or_partition(
                        &partitioner,
                        index,
                        &meshes[index],
                        &scene.meshes[index].layers,
                        &item.base,
                        item.has_collision_child,
                        &mut warnings,
                    );
                    objects.extend(instantiate(&item.object, &partition, is_map));
                }
                _ => {
                    let mut object = item.object;
                    if let Some(region) = item.base.region {
                        assign_region(&mut object, region, is_map);
                    }
                    objects.push(object);
                }
            }
        }

        if category == AssetCategory::Scenario {
            build_seams(&scene.asset.name, &region_names, &seam_sources, &mut objects, &mut warnings);
        }

        fix_render_meshes(&mut objects, corinth, category, &mut warnings);
        bind_to_skeleton(&mut objects, &skeleton);

        if category == AssetCategory::Animation
            && !objects
                .iter()
                .any(|o| assign_bucket(o, category, corinth) == Some(Bucket::Render))
        {
            objects.push(null_render(&skeleton));
        }

        let objects: Vec<BucketedObject> = objects
            .into_iter()
            .filter_map(|object| {
                assign_bucket(&object, category, corinth).map(|bucket| BucketedObject { bucket, object })
            })
            .collect();

        if objects.is_empty() {
            return Err(ForgeError::NoExportObjects);
        }

        let global_materials = collect_global_materials(&objects);
        let decorator_lods = objects
            .iter()
            .filter(|o| o.object.kind == ExportKind::Mesh(MeshType::Decorator))
            .filter_map(|o| o.object.props.decorator_lod)
            .collect();

        let regions = used_regions(&scene.regions, &objects, is_map);
        let permutations = used_permutations(&scene.permutations, &objects);

        for warning in &warnings {
            warn!("{}", warning);
        }
        info!(
            "Normalized {} ({}): {} objects, {} warnings",
            scene.asset.name,
            category,
            objects.len(),
            warnings.len()
        );

        Ok(NormalizedScene {
            asset: scene.asset,
            source: scene.source,
            corinth,
            regions,
            permutations,
            objects,
            skeleton,
            animations: scene.animations,
            global_materials,
            decorator_lods,
            warnings,
        })
    }
}

fn raw_kind(object: &SceneObject) -> Option<RawKind> {
    match &object.kind {
        ObjectKind::Mesh { mesh_type, .. } => Some(RawKind::Mesh(*mesh_type)),
        ObjectKind::Marker { marker_type, .. } => Some(RawKind::Marker(*marker_type)),
        ObjectKind::Frame | ObjectKind::Light { .. } => None,
    }
}

fn export_kind(object: &SceneObject, classified: Option<&Classified>) -> ExportKind {
    match (&object.kind, classified) {
        (_, Some(classified)) => classified.kind,
        (ObjectKind::Light { .. }, None) => ExportKind::Light,
        _ => ExportKind::Frame,
    }
}

/// Strip prefixes from every object name, keeping names unique and clear of
/// skeleton names. Maps original names to new ones.
fn rename_objects(objects: &[SceneObject], skeleton: &Skeleton) -> HashMap<String, String> {
    let mut protected: HashSet<String> = skeleton.protected_names().map(String::from).collect();
    let mut renames = HashMap::with_capacity(objects.len());
    for object in objects {
        let stripped = strip_prefix(&object.name);
        let base = if stripped.is_empty() { object.name.clone() } else { stripped };
        let base = pad_protected(base, &protected);
        let mut name = base.clone();
        let mut n = 1;
        while renames.values().any(|v: &String| *v == name) {
            name = format!("{}.{:03}", base, n);
            n += 1;
        }
        if name != object.name {
            debug!("Renamed {} to {}", object.name, name);
        }
        protected.insert(name.clone());
        renames.insert(object.name.clone(), name);
    }
    renames
}

fn resolve_table_entry(
    value: Option<&str>,
    table: &[String],
    object: &str,
    table_name: &'static str,
    warnings: &mut Vec<SceneWarning>,
) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => DEFAULT_NAME.to_string(),
        Some(v) if table.iter().any(|t| t == v) => v.to_string(),
        Some(v) => {
            warnings.push(SceneWarning::UnknownTableEntry {
                object: object.to_string(),
                table: table_name,
                name: v.to_string(),
            });
            DEFAULT_NAME.to_string()
        }
    }
}

fn base_props(
    classified: &Classified,
    source: &SceneObject,
    category: AssetCategory,
    warnings: &mut Vec<SceneWarning>,
) -> PartProps {
    let props = MeshProps {
        face_mode: classified.face_mode,
        poop_collision: classified.poop_collision,
        boundary_surface: classified.boundary_surface,
        obb_volume: classified.obb_volume,
        sky_face: classified.sky_face,
        decorator_lod: (category == AssetCategory::DecoratorSet).then(|| decorator_lod(source, warnings)),
        ..MeshProps::default()
    };
    PartProps::new(classified.mesh_type().unwrap_or(MeshType::Default), props)
}

/// Decorator level of detail, clamped to `1..=MAX_DECORATOR_LOD`.
fn decorator_lod(source: &SceneObject, warnings: &mut Vec<SceneWarning>) -> u8 {
    let lod = source.decorator_lod.unwrap_or(1);
    let clamped = lod.clamp(1, MAX_DECORATOR_LOD);
    if clamped != lod {
        warnings.push(SceneWarning::DecoratorLodOutOfRange {
            object: source.name.clone(),
            lod,
            clamped,
        });
    }
    clamped
}

/// Collision parented to instanced or default geometry in a legacy map.
fn is_instance_collision(source: &SceneObject, scene: &SceneSnapshot) -> bool {
    if !matches!(
        source.kind,
        ObjectKind::Mesh {
            mesh_type: RawMeshKind::Collision,
            ..
        }
    ) {
        return false;
    }
    let Some(parent) = source.parent.as_deref() else {
        return false;
    };
    scene.objects.iter().any(|o| {
        o.name == parent
            && matches!(
                o.kind,
                ObjectKind::Mesh {
                    mesh_type: RawMeshKind::Default | RawMeshKind::Instance,
                    ..
                }
            )
    })
}

fn is_partition_eligible(classified: &Classified, corinth: bool, category: AssetCategory) -> bool {
    let Some(mesh_type) = classified.mesh_type() else {
        return false;
    };
    if classified.face_mode == Some(FaceMode::LightmapOnly) {
        return false;
    }
    match mesh_type {
        MeshType::Collision | MeshType::Poop => true,
        MeshType::Default => !(corinth && category == AssetCategory::Scenario),
        _ => false,
    }
}

fn assign_region(object: &mut ExportObject, region: String, is_map: bool) {
    if is_map {
        object.bsp = Some(region);
    } else {
        object.region = region;
    }
}

/// One export object per part, named after `template`.
fn instantiate(template: &ExportObject, partition: &Partition, is_map: bool) -> Vec<ExportObject> {
    let mut out: Vec<ExportObject> = partition
        .parts
        .iter()
        .map(|part| {
            let mut object = template.clone();
            object.name = part.name_for(&template.name);
            object.kind = ExportKind::Mesh(part.resolved.mesh_type);
            object.props = part.resolved.props.clone();
            object.mesh = Some(Arc::clone(&part.mesh));
            object.normals = part.normals.clone();
            if let Some(region) = &part.resolved.region {
                assign_region(&mut object, region.clone(), is_map);
            }
            if let Some(parent) = part.parent {
                object.parent = Some(partition.parts[parent].name_for(&template.name));
            }
            object
        })
        .collect();

    for (index, part) in partition.parts.iter().enumerate() {
        if let Some(parent) = part.parent {
            let name = out[index].name.clone();
            out[parent].proxies.push(name);
        }
    }
    out
}

/// Give render meshes a material in every slot and a UV channel.
fn fix_render_meshes(
    objects: &mut [ExportObject],
    corinth: bool,
    category: AssetCategory,
    warnings: &mut Vec<SceneWarning>,
) {
    let mut fixed: HashMap<*const Mesh, Arc<Mesh>> = HashMap::new();
    for object in objects.iter_mut() {
        let Some(mesh_type) = object.kind.mesh_type() else {
            continue;
        };
        if !mesh_type.is_render(corinth, category) {
            continue;
        }
        let Some(mesh) = object.mesh.as_ref() else {
            continue;
        };
        let key = Arc::as_ptr(mesh);
        if let Some(done) = fixed.get(&key) {
            object.mesh = Some(Arc::clone(done));
            continue;
        }

        let missing_material =
            mesh.materials.iter().any(Option::is_none) || mesh.faces.iter().any(|f| f.material.is_none());
        let missing_uvs = mesh.uvs.is_empty();
        if !missing_material && !missing_uvs {
            fixed.insert(key, Arc::clone(mesh));
            continue;
        }

        let mut repaired = (**mesh).clone();
        if missing_material {
            fill_materials(&mut repaired);
            warnings.push(SceneWarning::MissingMaterial {
                object: object.name.clone(),
                placeholder: INVALID_MATERIAL,
            });
        }
        if missing_uvs {
            repaired.uvs = vec![Vec2::ZERO; repaired.positions.len()];
            warnings.push(SceneWarning::MissingUvs {
                object: object.name.clone(),
            });
        }
        let repaired = Arc::new(repaired);
        fixed.insert(key, Arc::clone(&repaired));
        object.mesh = Some(repaired);
    }
}

fn fill_materials(mesh: &mut Mesh) {
    for slot in mesh.materials.iter_mut().filter(|m| m.is_none()) {
        *slot = Some(INVALID_MATERIAL.to_string());
    }
    let placeholder = match mesh
        .materials
        .iter()
        .position(|m| m.as_deref() == Some(INVALID_MATERIAL))
    {
        Some(index) => index,
        None => {
            mesh.materials.push(Some(INVALID_MATERIAL.to_string()));
            mesh.materials.len() - 1
        }
    };
    for face in mesh.faces.iter_mut().filter(|f| f.material.is_none()) {
        face.material = Some(placeholder as u32);
    }
}

/// Drop references to objects that were not exported and attach everything
/// left unparented to the skeleton root.
fn bind_to_skeleton(objects: &mut [ExportObject], skeleton: &Skeleton) {
    let names: HashSet<String> = objects.iter().map(|o| o.name.clone()).collect();
    for object in objects.iter_mut() {
        if object.parent.as_ref().is_some_and(|p| !names.contains(p)) {
            object.parent = None;
        }
        if object.parent_bone.as_ref().is_some_and(|b| !skeleton.has_bone(b)) {
            object.parent_bone = None;
        }
        if object.parent.is_none() && object.parent_bone.is_none() {
            object.parent_bone = Some(skeleton.root.clone());
        }
    }
}

fn null_render(skeleton: &Skeleton) -> ExportObject {
    let mesh = Mesh {
        name: NULL_RENDER.to_string(),
        positions: vec![
            Vec3::new(-32.0, -32.0, 0.0),
            Vec3::new(32.0, -32.0, 0.0),
            Vec3::new(-32.0, 32.0, 0.0),
        ],
        uvs: vec![Vec2::ZERO; 3],
        faces: vec![Face {
            vertices: vec![0, 1, 2],
            material: Some(0),
        }],
        materials: vec![Some(INVALID_MATERIAL.to_string())],
    };
    let mut object = ExportObject::new(NULL_RENDER, ExportKind::Mesh(MeshType::Default));
    object.mesh = Some(Arc::new(mesh));
    object.parent_bone = Some(skeleton.root.clone());
    object
}

fn collect_global_materials(objects: &[BucketedObject]) -> Vec<String> {
    let mut materials = vec![DEFAULT_NAME.to_string()];
    for material in objects.iter().filter_map(|o| o.object.props.global_material.as_ref()) {
        if !materials.contains(material) {
            materials.push(material.clone());
        }
    }
    materials
}

fn used_regions(table: &[RegionEntry], objects: &[BucketedObject], is_map: bool) -> Vec<RegionEntry> {
    let used: HashSet<&str> = objects
        .iter()
        .filter_map(|o| {
            if is_map {
                o.object.bsp.as_deref()
            } else {
                Some(o.object.region.as_str())
            }
        })
        .collect();
    let mut regions: Vec<RegionEntry> = table.iter().filter(|r| used.contains(r.name.as_str())).cloned().collect();
    if used.contains(DEFAULT_NAME) && !regions.iter().any(|r| r.name == DEFAULT_NAME) {
        regions.insert(0, RegionEntry::new(DEFAULT_NAME));
    }
    if regions.is_empty() {
        regions.push(RegionEntry::new(DEFAULT_NAME));
    }
    regions
}

fn used_permutations(table: &[String], objects: &[BucketedObject]) -> Vec<String> {
    let used: HashSet<&str> = objects.iter().map(|o| o.object.permutation.as_str()).collect();
    let mut permutations: Vec<String> = table.iter().filter(|p| used.contains(p.as_str())).cloned().collect();
    if used.contains(DEFAULT_NAME) && !permutations.iter().any(|p| p == DEFAULT_NAME) {
        permutations.insert(0, DEFAULT_NAME.to_string());
    }
    if permutations.is_empty() {
        permutations.push(DEFAULT_NAME.to_string());
    }
    permutations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::NormalBinding;
    use crate::scene::mesh::tests::quad_strip;
    use crate::scene::{
        Armature, Bone, CollisionOverride, FaceLayer, FaceOverrides, RawMarkerKind, SceneMesh,
    };

    fn scene(category: AssetCategory) -> SceneSnapshot {
        SceneSnapshot::new(AssetInfo {
            name: "crate".into(),
            category,
            directory: PathBuf::from("objects/crate"),
        })
    }

    fn add_mesh(scene: &mut SceneSnapshot, faces: u32, layers: Vec<FaceLayer>) -> usize {
        scene.meshes.push(SceneMesh {
            geometry: quad_strip(faces),
            layers: layers.into_iter().collect(),
        });
        scene.meshes.len() - 1
    }

    fn mesh_object(name: &str, mesh: usize, mesh_type: RawMeshKind) -> SceneObject {
        SceneObject::new(name, ObjectKind::Mesh { mesh, mesh_type })
    }

    fn names(normalized: &NormalizedScene, bucket: Bucket) -> Vec<String> {
        normalized.objects_in(bucket).map(|o| o.name.clone()).collect()
    }

    #[test]
    fn test_model_render_and_collision() {
        let mut scene = scene(AssetCategory::Model);
        let mesh = add_mesh(&mut scene, 2, vec![]);
        scene.objects.push(mesh_object("Frame_Body", mesh, RawMeshKind::Default));
        scene.objects.push(mesh_object("@hull", mesh, RawMeshKind::Collision));

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        assert_eq!(names(&normalized, Bucket::Render), vec!["body"]);
        assert_eq!(names(&normalized, Bucket::Collision), vec!["hull"]);
        assert!(normalized.skeleton.synthesized);
        for object in normalized.objects.iter().map(|o| &o.object) {
            assert_eq!(object.parent_bone.as_deref(), Some("pedestal"));
            assert_eq!(object.region, "default");
        }
    }

    #[test]
    fn test_invalid_and_empty_objects_are_removed() {
        let mut scene = scene(AssetCategory::Model);
        let mesh = add_mesh(&mut scene, 1, vec![]);
        scene.meshes.push(SceneMesh::default());
        scene.objects.push(mesh_object("body", mesh, RawMeshKind::Default));
        scene.objects.push(mesh_object("portal", mesh, RawMeshKind::Portal));
        scene.objects.push(mesh_object("empty", 1, RawMeshKind::Default));
        let mut hidden = mesh_object("hidden", mesh, RawMeshKind::Default);
        hidden.exportable = false;
        scene.objects.push(hidden);

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        assert_eq!(normalized.objects.len(), 1);
        assert!(normalized
            .warnings
            .iter()
            .any(|w| matches!(w, SceneWarning::InvalidType { object, .. } if object == "portal")));
        assert!(normalized
            .warnings
            .contains(&SceneWarning::EmptyMesh { object: "empty".into() }));
    }

    #[test]
    fn test_nothing_exportable_is_an_error() {
        let mut scene = scene(AssetCategory::Model);
        let mesh = add_mesh(&mut scene, 1, vec![]);
        scene.objects.push(mesh_object("portal", mesh, RawMeshKind::Portal));
        let result = Normalizer::new(Target::Reach).normalize(scene);
        assert!(matches!(result, Err(ForgeError::NoExportObjects)));
    }

    #[test]
    fn test_unknown_permutation_falls_back() {
        let mut scene = scene(AssetCategory::Model);
        scene.permutations.push("damaged".into());
        let mesh = add_mesh(&mut scene, 1, vec![]);
        let mut object = mesh_object("body", mesh, RawMeshKind::Default);
        object.permutation = Some("broken".into());
        scene.objects.push(object);
        let mut damaged = mesh_object("dented", mesh, RawMeshKind::Default);
        damaged.permutation = Some("damaged".into());
        scene.objects.push(damaged);

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        assert_eq!(normalized.permutations, vec!["default".to_string(), "damaged".to_string()]);
        assert!(normalized.warnings.iter().any(|w| matches!(
            w,
            SceneWarning::UnknownTableEntry { table: "permutation", name, .. } if name == "broken"
        )));
    }

    #[test]
    fn test_names_clear_of_bones() {
        let mut scene = scene(AssetCategory::Model);
        scene.armature = Some(Armature {
            name: "rig".into(),
            bones: vec![Bone {
                name: "pelvis".into(),
                parent: None,
            }],
        });
        let mesh = add_mesh(&mut scene, 1, vec![]);
        scene.objects.push(mesh_object("b_pelvis", mesh, RawMeshKind::Default));

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        assert_eq!(names(&normalized, Bucket::Render), vec!["pelvis.padding"]);
    }

    #[test]
    fn test_scenario_instance_split_by_layer() {
        let mut scene = scene(AssetCategory::Scenario);
        scene.regions = vec![RegionEntry::new("010")];
        let layer = FaceLayer::new("glass", 0..2).with_overrides(FaceOverrides {
            collision: Some(CollisionOverride::RenderOnly),
            ..Default::default()
        });
        let mesh = add_mesh(&mut scene, 4, vec![layer]);
        let mut object = mesh_object("window", mesh, RawMeshKind::Default);
        object.region = Some("010".into());
        scene.objects.push(object);

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        let structure = names(&normalized, Bucket::Structure);
        assert_eq!(structure, vec!["window(glass)", "window", "window(collision)"]);

        let glass = normalized.objects_in(Bucket::Structure).next().unwrap();
        assert_eq!(glass.bsp.as_deref(), Some("010"));
        assert_eq!(glass.proxies, vec!["window(collision)".to_string()]);
        assert!(glass.normals.as_ref().map(NormalBinding::source_mesh).is_some());

        let proxy = normalized.objects_in(Bucket::Structure).last().unwrap();
        assert_eq!(proxy.parent.as_deref(), Some("window(glass)"));
        assert_eq!(proxy.kind, ExportKind::Mesh(MeshType::PoopCollision));
        assert_eq!(normalized.bsps_in(Bucket::Structure), vec!["010".to_string()]);
    }

    #[test]
    fn test_linked_objects_share_partition() {
        let mut scene = scene(AssetCategory::Scenario);
        let layer = FaceLayer::new("trim", 0..1).with_overrides(FaceOverrides {
            ladder: true,
            ..Default::default()
        });
        let mesh = add_mesh(&mut scene, 3, vec![layer]);
        scene.objects.push(mesh_object("pillar_a", mesh, RawMeshKind::Default));
        scene.objects.push(mesh_object("pillar_b", mesh, RawMeshKind::Default));

        let normalized = Normalizer::new(Target::Corinth).normalize(scene).unwrap();
        let objects: Vec<&ExportObject> = normalized.objects_in(Bucket::Structure).collect();
        assert_eq!(objects.len(), 4);
        let a = objects.iter().find(|o| o.name == "pillar_a(trim)").unwrap();
        let b = objects.iter().find(|o| o.name == "pillar_b(trim)").unwrap();
        assert!(Arc::ptr_eq(a.mesh.as_ref().unwrap(), b.mesh.as_ref().unwrap()));
        assert!(a.props.ladder);
    }

    #[test]
    fn test_animation_gets_null_render() {
        let mut scene = scene(AssetCategory::Animation);
        scene.animations.push(AnimationClip::new("walk"));
        scene.objects.push(SceneObject::new(
            "hand",
            ObjectKind::Marker {
                marker_type: RawMarkerKind::Model,
                game_instance_tag: None,
            },
        ));

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        let null = normalized.objects_in(Bucket::Render).next().unwrap();
        assert_eq!(null.name, NULL_RENDER);
        assert_eq!(null.face_count(), 1);
        assert_eq!(null.parent_bone.as_deref(), Some("pedestal"));
        assert_eq!(normalized.exported_animations().count(), 1);
    }

    #[test]
    fn test_missing_material_and_uvs_fixed_once() {
        let mut scene = scene(AssetCategory::Model);
        let mut geometry = quad_strip(2);
        geometry.materials = vec![None];
        geometry.faces[0].material = Some(0);
        scene.meshes.push(SceneMesh {
            geometry,
            layers: FaceLayerStore::new(),
        });
        scene.objects.push(mesh_object("a", 0, RawMeshKind::Default));
        scene.objects.push(mesh_object("b", 0, RawMeshKind::Default));

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        let material_warnings = normalized
            .warnings
            .iter()
            .filter(|w| matches!(w, SceneWarning::MissingMaterial { .. }))
            .count();
        assert_eq!(material_warnings, 1);

        let mesh = normalized.objects[0].object.mesh.as_ref().unwrap();
        assert_eq!(mesh.materials, vec![Some(INVALID_MATERIAL.to_string())]);
        assert!(mesh.faces.iter().all(|f| f.material == Some(0)));
        assert_eq!(mesh.uvs.len(), mesh.positions.len());
        assert!(Arc::ptr_eq(mesh, normalized.objects[1].object.mesh.as_ref().unwrap()));
    }

    #[test]
    fn test_global_materials_default_first() {
        let mut scene = scene(AssetCategory::Model);
        let mesh = add_mesh(&mut scene, 1, vec![]);
        for (name, material) in [("a", "metal hard"), ("b", "wood"), ("c", "metal hard")] {
            let mut object = mesh_object(name, mesh, RawMeshKind::Default);
            object.overrides.global_material = Some(material.into());
            scene.objects.push(object);
        }
        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        assert_eq!(normalized.global_materials, vec!["default", "metal_hard", "wood"]);
        assert_eq!(normalized.global_material_index("wood"), Some(2));
    }

    #[test]
    fn test_decorator_lods_collected() {
        let mut scene = scene(AssetCategory::DecoratorSet);
        let mesh = add_mesh(&mut scene, 1, vec![]);
        scene.objects.push(mesh_object("grass", mesh, RawMeshKind::Default));
        let mut far = mesh_object("grass_far", mesh, RawMeshKind::Default);
        far.decorator_lod = Some(3);
        scene.objects.push(far);

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        assert_eq!(normalized.decorator_lods.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_decorator_lod_out_of_range_is_clamped() {
        let mut scene = scene(AssetCategory::DecoratorSet);
        let mesh = add_mesh(&mut scene, 1, vec![]);
        let mut zero = mesh_object("grass_zero", mesh, RawMeshKind::Default);
        zero.decorator_lod = Some(0);
        scene.objects.push(zero);
        let mut far = mesh_object("grass_far", mesh, RawMeshKind::Default);
        far.decorator_lod = Some(9);
        scene.objects.push(far);

        let normalized = Normalizer::new(Target::Reach).normalize(scene).unwrap();
        assert_eq!(normalized.decorator_lods.iter().copied().collect::<Vec<_>>(), vec![1, 4]);
        assert!(normalized.warnings.contains(&SceneWarning::DecoratorLodOutOfRange {
            object: "grass_zero".into(),
            lod: 0,
            clamped: 1,
        }));
        assert!(normalized.warnings.contains(&SceneWarning::DecoratorLodOutOfRange {
            object: "grass_far".into(),
            lod: 9,
            clamped: 4,
        }));
    }

    #[test]
    fn test_corinth_proxy_instance_copy() {
        let mut scene = scene(AssetCategory::Scenario);
        let mesh = add_mesh(&mut scene, 2, vec![]);
        let mut structure = mesh_object("floor", mesh, RawMeshKind::Structure);
        structure.proxy_instance = true;
        scene.objects.push(structure);

        let normalized = Normalizer::new(Target::Corinth).normalize(scene).unwrap();
        let instance = normalized
            .objects_in(Bucket::Structure)
            .find(|o| o.name == "floor(instance)")
            .unwrap();
        assert_eq!(instance.kind, ExportKind::Mesh(MeshType::Poop));
        assert!(!instance.props.sky_face);
        let floor = normalized.objects_in(Bucket::Structure).find(|o| o.name == "floor").unwrap();
        assert!(floor.props.sky_face);
    }
}
