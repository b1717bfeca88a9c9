//! JSON metadata written next to each interchange file.
//!
//! Property values are strings, as the converter expects. Every table is a
//! `BTreeMap` so the output is stable across runs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::jobs::ExportJob;
use crate::normalize::NormalizedScene;
use crate::scene::{AssetCategory, ExportKind, ExportObject, MeshProps};

pub type Properties = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub string_table: BTreeMap<String, Vec<String>>,
    pub nodes_properties: BTreeMap<String, Properties>,
    pub meshes_properties: BTreeMap<String, Properties>,
    pub material_properties: BTreeMap<String, Properties>,
}

impl JobMetadata {
    pub fn build(scene: &NormalizedScene, job: &ExportJob) -> Self {
        let objects: Vec<&ExportObject> = job
            .objects
            .iter()
            .filter_map(|&i| scene.objects.get(i))
            .map(|o| &o.object)
            .collect();

        let mut metadata = Self {
            string_table: string_table(scene, &objects),
            ..Default::default()
        };

        for (i, bone) in scene.skeleton.bones.iter().enumerate() {
            let mut props = Properties::new();
            props.insert("bungie_object_type".into(), ExportKind::Frame.object_type().into());
            if i == 0 || bone.name == scene.skeleton.root {
                props.insert("bungie_frame_ID1".into(), scene.skeleton.frame_ids.0.to_string());
                props.insert("bungie_frame_ID2".into(), scene.skeleton.frame_ids.1.to_string());
                if scene.skeleton.world_frame {
                    props.insert("bungie_frame_world".into(), "1".into());
                }
            }
            metadata.nodes_properties.insert(bone.name.clone(), props);
        }

        for object in &objects {
            match object.kind {
                ExportKind::Mesh(_) => {
                    let props = mesh_properties(scene, object);
                    metadata.meshes_properties.insert(object.name.clone(), props);
                    if let Some(mesh) = &object.mesh {
                        for material in mesh.materials.iter().flatten() {
                            metadata
                                .material_properties
                                .entry(material.clone())
                                .or_insert_with(|| material_properties(material, scene.corinth));
                        }
                    }
                }
                _ => {
                    metadata
                        .nodes_properties
                        .insert(object.name.clone(), node_properties(object));
                }
            }
        }
        metadata
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ForgeError::InterchangeWrite {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ForgeError::InterchangeWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn string_table(scene: &NormalizedScene, objects: &[&ExportObject]) -> BTreeMap<String, Vec<String>> {
    let mut table = BTreeMap::new();
    let category = scene.category();
    if matches!(
        category,
        AssetCategory::Model | AssetCategory::Scenario | AssetCategory::Prefab | AssetCategory::Sky
    ) {
        let values = (0..scene.global_materials.len()).map(|i| i.to_string()).collect();
        table.insert("global_materials_names".into(), scene.global_materials.clone());
        table.insert("global_materials_values".into(), values);
    }
    if matches!(category, AssetCategory::Model | AssetCategory::Sky) {
        let regions: Vec<String> = scene
            .regions
            .iter()
            .filter(|r| objects.iter().any(|o| o.region == r.name))
            .map(|r| r.name.clone())
            .collect();
        let values = (0..regions.len()).map(|i| i.to_string()).collect();
        table.insert("regions_names".into(), regions);
        table.insert("regions_values".into(), values);
    }
    table
}

fn flag(props: &mut Properties, key: &str, on: bool) {
    if on {
        props.insert(key.into(), "1".into());
    }
}

fn color(c: &[f32; 4]) -> String {
    format!("{:.6} {:.6} {:.6} {:.6}", c[0], c[1], c[2], c[3])
}

fn mesh_properties(scene: &NormalizedScene, object: &ExportObject) -> Properties {
    let mut props = Properties::new();
    props.insert("bungie_object_type".into(), object.kind.object_type().into());
    if let Some(mesh_type) = object.kind.mesh_type() {
        props.insert("bungie_mesh_type".into(), mesh_type.as_str().into());
    }
    if scene.category().supports_regions() && !scene.category().is_map() {
        props.insert("bungie_face_region".into(), object.region.clone());
    }
    write_mesh_props(&mut props, &object.props, scene);
    props
}

fn write_mesh_props(props: &mut Properties, mesh: &MeshProps, scene: &NormalizedScene) {
    if let Some(mode) = mesh.face_mode {
        props.insert("bungie_face_mode".into(), mode.as_str().into());
    }
    if let Some(collision) = mesh.poop_collision {
        props.insert("bungie_mesh_poop_collision_type".into(), collision.as_str().into());
    }
    if let Some(sides) = mesh.face_sides {
        props.insert("bungie_face_sides".into(), sides.as_string());
    }
    if let Some(distance) = mesh.draw_distance {
        props.insert("bungie_face_draw_distance".into(), distance.as_str().into());
    }
    if let Some(material) = &mesh.global_material {
        let index = scene.global_material_index(material).unwrap_or(0);
        props.insert("bungie_face_global_material".into(), index.to_string());
    }
    if let Some(surface) = mesh.boundary_surface {
        props.insert("bungie_mesh_boundary_surface_type".into(), surface.as_str().into());
    }
    if let Some(obb) = mesh.obb_volume {
        props.insert("bungie_mesh_obb_type".into(), obb.as_str().into());
    }
    if let Some(bsp) = &mesh.seam_associated_bsp {
        props.insert("bungie_mesh_seam_associated_bsp".into(), bsp.clone());
    }
    flag(props, "bungie_ladder", mesh.ladder);
    flag(props, "bungie_slip_surface", mesh.slip_surface);
    flag(props, "bungie_decal_offset", mesh.decal_offset);
    flag(props, "bungie_no_shadow", mesh.no_shadow);
    flag(props, "bungie_precise_position", mesh.precise_position);
    flag(props, "bungie_mesh_additional_compression", mesh.additional_compression_off);
    flag(props, "bungie_no_lightmap", mesh.no_lightmap);
    flag(props, "bungie_invisible_to_pvs", mesh.invisible_to_pvs);

    let lightmap = &mesh.lightmap;
    if let Some(c) = &lightmap.additive_transparency {
        props.insert("bungie_lightmap_additive_transparency".into(), color(c));
    }
    if let Some(scale) = lightmap.resolution_scale {
        props.insert("bungie_lightmap_resolution_scale".into(), format!("{:.6}", scale));
    }
    if let Some(kind) = &lightmap.lightmap_type {
        props.insert("bungie_lightmap_type".into(), kind.clone());
    }
    if let Some(c) = &lightmap.translucency_tint {
        props.insert("bungie_lightmap_translucency_tint_color".into(), color(c));
    }
    flag(props, "bungie_lightmap_lighting_from_both_sides", lightmap.lighting_from_both_sides);

    if let Some(emissive) = &mesh.emissive {
        props.insert("bungie_lighting_emissive_power".into(), format!("{:.6}", emissive.power));
        props.insert("bungie_lighting_emissive_color".into(), color(&emissive.color));
        props.insert("bungie_lighting_emissive_focus".into(), format!("{:.6}", emissive.focus));
        if let Some((falloff, cutoff)) = emissive.attenuation {
            props.insert("bungie_lighting_attenuation_enabled".into(), "1".into());
            props.insert("bungie_lighting_attenuation_falloff".into(), format!("{:.6}", falloff));
            props.insert("bungie_lighting_attenuation_cutoff".into(), format!("{:.6}", cutoff));
        }
        flag(props, "bungie_lighting_emissive_per_unit", emissive.per_unit);
        flag(props, "bungie_lighting_emissive_quality", emissive.quality);
        flag(props, "bungie_lighting_use_shader_gel", emissive.use_shader_gel);
        props.insert("bungie_lighting_bounce_ratio".into(), format!("{:.6}", emissive.bounce_ratio));
    }
}

fn node_properties(object: &ExportObject) -> Properties {
    let mut props = Properties::new();
    props.insert("bungie_object_type".into(), object.kind.object_type().into());
    match object.kind {
        ExportKind::Marker(marker) => {
            props.insert("bungie_marker_type".into(), marker.as_str().into());
            props.insert("bungie_marker_region".into(), object.region.clone());
            if let Some(tag) = &object.game_instance_tag {
                props.insert("bungie_marker_game_instance_tag_name".into(), tag.clone());
            }
        }
        ExportKind::Light => {
            if let Some(light) = &object.light {
                let kind = serde_json::to_value(light.kind)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                props.insert("bungie_light_type".into(), format!("_connected_geometry_light_type_{}", kind));
                props.insert(
                    "bungie_light_color".into(),
                    format!("{:.6} {:.6} {:.6}", light.color[0], light.color[1], light.color[2]),
                );
                props.insert("bungie_light_intensity".into(), format!("{:.6}", light.intensity));
            }
        }
        _ => {}
    }
    props
}

fn material_properties(name: &str, corinth: bool) -> Properties {
    let mut props = Properties::new();
    let special = name.starts_with('+');
    let shader_type = match (corinth, special) {
        (true, _) => "material",
        (false, true) => "override",
        (false, false) => "shader",
    };
    props.insert("bungie_shader_path".into(), name.to_string());
    props.insert("bungie_shader_type".into(), shader_type.into());
    props
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Target;
    use crate::jobs::{JobFilter, JobPlanner, JobRole};
    use crate::normalize::{Normalizer, INVALID_MATERIAL};
    use crate::scene::mesh::tests::quad_strip;
    use crate::scene::{
        AssetInfo, ObjectKind, RawMarkerKind, RawMeshKind, RegionEntry, SceneMesh, SceneObject, SceneSnapshot,
    };
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn scene(target: Target) -> NormalizedScene {
        let mut scene = SceneSnapshot::new(AssetInfo {
            name: "crate".into(),
            category: AssetCategory::Model,
            directory: PathBuf::from("objects/crate"),
        });
        scene.regions.push(RegionEntry::new("lid"));
        scene.meshes.push(SceneMesh {
            geometry: quad_strip(2),
            layers: Default::default(),
        });
        let mut body = SceneObject::new(
            "body",
            ObjectKind::Mesh {
                mesh: 0,
                mesh_type: RawMeshKind::Default,
            },
        );
        body.overrides.global_material = Some("metal".into());
        body.overrides.ladder = true;
        scene.objects.push(body);
        scene.objects.push(SceneObject::new(
            "handle",
            ObjectKind::Marker {
                marker_type: RawMarkerKind::Model,
                game_instance_tag: None,
            },
        ));
        Normalizer::new(target).normalize(scene).unwrap()
    }

    #[test]
    fn test_render_metadata() {
        let scene = scene(Target::Reach);
        let plan = JobPlanner::new(JobFilter::default()).plan(&scene).unwrap();
        let job = plan.with_role(JobRole::Render).next().unwrap();
        let metadata = JobMetadata::build(&scene, job);

        assert_eq!(
            metadata.string_table["global_materials_names"],
            vec!["default".to_string(), "metal".to_string()]
        );
        assert_eq!(metadata.string_table["regions_names"], vec!["default".to_string()]);
        let body = &metadata.meshes_properties["body"];
        assert_eq!(body["bungie_face_global_material"], "1");
        assert_eq!(body["bungie_ladder"], "1");
        assert_eq!(body["bungie_face_region"], "default");
        assert_eq!(metadata.material_properties[INVALID_MATERIAL]["bungie_shader_type"], "override");
        assert_eq!(metadata.nodes_properties["pedestal"]["bungie_frame_ID1"], "8078");
    }

    #[test]
    fn test_markers_are_nodes() {
        let scene = scene(Target::Corinth);
        let plan = JobPlanner::new(JobFilter::default()).plan(&scene).unwrap();
        let job = plan.with_role(JobRole::Markers).next().unwrap();
        let metadata = JobMetadata::build(&scene, job);

        assert!(metadata.meshes_properties.is_empty());
        let handle = &metadata.nodes_properties["handle"];
        assert_eq!(handle["bungie_marker_type"], "_connected_geometry_marker_type_model");
        assert_eq!(metadata.nodes_properties["pedestal"]["bungie_frame_world"], "1");
    }

    #[test]
    fn test_write_pretty_json() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("models/crate_render.json");
        let scene = scene(Target::Reach);
        let plan = JobPlanner::new(JobFilter::default()).plan(&scene).unwrap();
        JobMetadata::build(&scene, &plan.jobs[0]).write(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n  \"string_table\""));
        let parsed: JobMetadata = serde_json::from_str(&content).unwrap();
        assert!(parsed.meshes_properties.contains_key("body"));
    }
}
