//! Build manifest ("sidecar") assembly.

use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::Local;
use log::info;

use super::xml::XmlElement;
use crate::config::ExportSettings;
use crate::error::{ForgeError, Result};
use crate::jobs::{ExportJob, JobPlan, JobRole};
use crate::normalize::NormalizedScene;
use crate::scene::{AnimationClip, AnimationKind, AnimationSpace, AssetCategory, Movement, DEFAULT_NAME};

/// High level object tags a model may produce, in manifest order.
pub const OBJECT_TAGS: [&str; 13] = [
    "biped",
    "crate",
    "creature",
    "device_control",
    "device_dispenser",
    "device_machine",
    "device_terminal",
    "effect_scenery",
    "equipment",
    "giant",
    "scenery",
    "vehicle",
    "weapon",
];

const FOLDERS: [(&str, &str); 26] = [
    ("Reference", "\\reference"),
    ("Temp", "\\temp"),
    ("SourceModels", "\\models\\work"),
    ("GameModels", "\\models"),
    ("GamePhysicsModels", "\\models"),
    ("GameCollisionModels", "\\models"),
    ("ExportModels", "\\export\\models"),
    ("ExportPhysicsModels", "\\export\\models"),
    ("ExportCollisionModels", "\\export\\models"),
    ("SourceAnimations", "\\animations\\work"),
    ("AnimationsRigs", "\\animations\\rigs"),
    ("GameAnimations", "\\animations"),
    ("ExportAnimations", "\\export\\animations"),
    ("SourceBitmaps", "\\bitmaps"),
    ("GameBitmaps", "\\bitmaps"),
    ("CinemaSource", "\\cinematics"),
    ("CinemaExport", "\\export\\cinematics"),
    ("ExportBSPs", "\\models"),
    ("SourceBSPs", "\\models"),
    ("RigFlags", "\\animations\\rigs\\flags"),
    ("RigPoses", "\\animations\\rigs\\poses"),
    ("RigRenders", "\\animations\\rigs\\render"),
    ("Scripts", "\\scripts"),
    ("FacePoses", "\\animations\\rigs\\poses\\face_poses"),
    ("CinematicOutsource", "\\outsource"),
    ("CinematicSceneSegments", "\\segments"),
];

const LEGACY_FOLDERS: [(&str, &str); 5] = [
    ("Retarget", "\\working\\retarget"),
    ("RetargetSourceAnimations", "\\working\\retarget\\binge"),
    ("RetargetTargetAnimations", "\\working\\retarget\\purge"),
    ("Export", "\\export"),
    ("SourceAnimationLibrary", "\\animations\\library"),
];

/// Path with `\` separators, as the tag compiler expects.
pub fn windows_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\\")
}

/// `{asset_dir}/{asset}.sidecar.xml`, relative to the data directory.
pub fn manifest_path(asset_dir: &Path, asset: &str) -> PathBuf {
    asset_dir.join(format!("{}.sidecar.xml", asset))
}

/// A finished manifest tree.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildManifest {
    pub root: XmlElement,
    /// Relative to the data directory.
    pub path: PathBuf,
    /// The model produced only the placeholder scenery tag.
    pub no_top_level_tag: bool,
}

impl BuildManifest {
    pub fn to_xml(&self) -> String {
        self.root.to_document()
    }

    /// Every `IntermediateFile` referenced by a content network.
    pub fn intermediate_files(&self) -> Vec<String> {
        self.root
            .descendants("ContentNetwork")
            .into_iter()
            .filter_map(|n| n.child("IntermediateFile"))
            .filter_map(|f| f.text.clone())
            .collect()
    }

    /// Write under `data_dir`, refusing to replace a read-only file.
    pub fn write(&self, data_dir: &Path) -> Result<PathBuf> {
        let full = data_dir.join(&self.path);
        if let Ok(meta) = fs::metadata(&full) {
            if meta.permissions().readonly() {
                return Err(ForgeError::ManifestReadOnly { path: full });
            }
        }
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, self.to_xml())?;
        info!("Wrote manifest {}", full.display());
        Ok(full)
    }
}

/// Assembles a [`BuildManifest`] from a scene and its job plan.
pub struct ManifestBuilder<'a> {
    scene: &'a NormalizedScene,
    plan: &'a JobPlan,
    settings: &'a ExportSettings,
    created: String,
    author: String,
    /// `{asset_dir}\{asset}`
    tag_path: String,
    source: String,
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(scene: &'a NormalizedScene, plan: &'a JobPlan, settings: &'a ExportSettings) -> Self {
        let source = scene
            .source
            .strip_prefix(&settings.project.data_dir)
            .map(windows_path)
            .unwrap_or_else(|_| {
                if scene.source.is_relative() {
                    windows_path(&scene.source)
                } else {
                    scene.source.display().to_string()
                }
            });
        Self {
            scene,
            plan,
            settings,
            created: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            author: current_user(),
            tag_path: windows_path(&scene.asset.directory.join(&scene.asset.name)),
            source,
        }
    }

    /// Fix the creation stamp and author.
    pub fn with_header(mut self, created: impl Into<String>, author: impl Into<String>) -> Self {
        self.created = created.into();
        self.author = author.into();
        self
    }

    pub fn build(&self) -> BuildManifest {
        let mut root = XmlElement::new("Metadata");
        self.write_header(&mut root);
        let no_top_level_tag = self.write_asset(&mut root);
        self.write_folders(&mut root);
        self.write_face_collections(&mut root);

        let contents = root.push(XmlElement::new("Contents"));
        match self.scene.category() {
            AssetCategory::Model => self.model_contents(contents),
            AssetCategory::Scenario => self.scenario_contents(contents),
            AssetCategory::Sky => self.sky_contents(contents),
            AssetCategory::DecoratorSet => self.decorator_contents(contents),
            AssetCategory::ParticleModel => self.particle_contents(contents),
            AssetCategory::Prefab => self.prefab_contents(contents),
            AssetCategory::Animation => self.animation_contents(contents),
        }

        BuildManifest {
            root,
            path: manifest_path(&self.scene.asset.directory, &self.scene.asset.name),
            no_top_level_tag,
        }
    }

    fn corinth(&self) -> bool {
        self.scene.corinth
    }

    fn write_header(&self, root: &mut XmlElement) {
        let header = root.push(XmlElement::new("Header"));
        header.push(XmlElement::text_node("MainRev", "0"));
        header.push(XmlElement::text_node("PointRev", "6"));
        header.push(XmlElement::text_node("Description", "Forged in Foundry"));
        header.push(XmlElement::text_node("Created", self.created.clone()));
        header.push(XmlElement::text_node("By", self.author.clone()));
        header.push(XmlElement::text_node("DirectoryType", "TAE.Shared.NWOAssetDirectory"));
        header.push(XmlElement::text_node("Schema", "1"));
        header.push(XmlElement::text_node("SourceBlend", self.source.clone()));
        let animation_only = if self.scene.category() == AssetCategory::Animation {
            "True"
        } else {
            "False"
        };
        header.push(XmlElement::text_node("AnimationOnly", animation_only));
    }

    /// Model output tags: `model`, then the selected object tags, with a
    /// placeholder `scenery` when none is selected.
    fn model_tags(&self) -> (Vec<&'static str>, bool) {
        let mut tags = vec!["model"];
        tags.extend(
            OBJECT_TAGS
                .iter()
                .copied()
                .filter(|t| self.settings.output_tags.iter().any(|o| o == t)),
        );
        if tags.len() == 1 {
            tags.push("scenery");
            return (tags, true);
        }
        (tags, false)
    }

    /// Returns whether the model produced only the placeholder scenery tag.
    fn write_asset(&self, root: &mut XmlElement) -> bool {
        let category = self.scene.category();
        let asset_type = match category {
            AssetCategory::Sky if !self.corinth() => "sky",
            AssetCategory::Sky | AssetCategory::Animation => "model",
            other => other.as_str(),
        };
        let mut asset = XmlElement::new("Asset")
            .attr("Name", self.scene.asset.name.clone())
            .attr("Type", asset_type);
        if asset_type == "sky" {
            asset.set_attr("Sky", "true");
        }
        let asset = root.push(asset);
        let outputs = asset.push(XmlElement::new("OutputTagCollection"));
        let tag = |kind: &str, path: String| XmlElement::text_node("OutputTag", path).attr("Type", kind);

        let mut no_top_level_tag = false;
        match category {
            AssetCategory::Model => {
                let (tags, placeholder) = self.model_tags();
                no_top_level_tag = placeholder;
                for kind in tags {
                    outputs.push(tag(kind, self.tag_path.clone()));
                }
            }
            AssetCategory::Scenario => {
                outputs.push(tag("scenario_lightmap", format!("{}_faux_lightmap", self.tag_path)));
                outputs.push(tag("structure_seams", self.tag_path.clone()));
                outputs.push(tag("scenario", self.tag_path.clone()));
            }
            AssetCategory::Sky | AssetCategory::Animation => {
                outputs.push(tag("model", self.tag_path.clone()));
                outputs.push(tag("scenery", self.tag_path.clone()));
            }
            AssetCategory::DecoratorSet | AssetCategory::ParticleModel | AssetCategory::Prefab => {
                outputs.push(tag(category.as_str(), self.tag_path.clone()));
            }
        }
        no_top_level_tag
    }

    fn write_folders(&self, root: &mut XmlElement) {
        let folders = root.push(XmlElement::new("Folders"));
        let legacy: &[(&str, &str)] = if self.corinth() { &[] } else { &LEGACY_FOLDERS };
        for (name, path) in FOLDERS.iter().chain(legacy.iter()) {
            folders.push(XmlElement::text_node(*name, *path));
        }
    }

    fn write_face_collections(&self, root: &mut XmlElement) {
        let collections = root.push(XmlElement::new("FaceCollections"));
        let category = self.scene.category();
        if matches!(category, AssetCategory::Model | AssetCategory::Sky) {
            let entries = collections
                .push(
                    XmlElement::new("FaceCollection")
                        .attr("Name", "regions")
                        .attr("StringTable", "connected_geometry_regions_table")
                        .attr("Description", "Model regions"),
                )
                .push(XmlElement::new("FaceCollectionEntries"));
            for (i, region) in self.scene.regions.iter().enumerate() {
                entries.push(
                    XmlElement::new("FaceCollectionEntry")
                        .attr("Index", i.to_string())
                        .attr("Name", region.name.clone())
                        .attr("Active", if region.active { "true" } else { "false" }),
                );
            }
        }
        if matches!(
            category,
            AssetCategory::Model | AssetCategory::Scenario | AssetCategory::Prefab
        ) {
            let entries = collections
                .push(
                    XmlElement::new("FaceCollection")
                        .attr("Name", "global materials override")
                        .attr("StringTable", "connected_geometry_global_material_table")
                        .attr("Description", "Global material overrides"),
                )
                .push(XmlElement::new("FaceCollectionEntries"));
            for (i, material) in self.scene.global_materials.iter().enumerate() {
                entries.push(
                    XmlElement::new("FaceCollectionEntry")
                        .attr("Index", i.to_string())
                        .attr("Name", material.clone())
                        .attr("Active", "true"),
                );
            }
        }
    }

    fn jobs(&self, role: JobRole) -> Vec<&'a ExportJob> {
        self.plan.with_role(role).collect()
    }

    fn network(&self, name: impl Into<String>, job: &ExportJob) -> XmlElement {
        let mut network = XmlElement::new("ContentNetwork").attr("Name", name).attr("Type", "");
        self.network_files(&mut network, job);
        network
    }

    fn network_files(&self, network: &mut XmlElement, job: &ExportJob) {
        network.push(XmlElement::text_node("InputFile", self.source.clone()));
        network.push(XmlElement::text_node("IntermediateFile", windows_path(&job.paths.compiled)));
    }

    fn bsp_network_name(&self, job: &ExportJob, design: bool) -> String {
        format!(
            "{}_{}_{}_{}",
            self.scene.asset.name,
            if design { "design" } else { "structure" },
            job.bsp.as_deref().unwrap_or(DEFAULT_NAME),
            job.permutation
        )
    }

    /// A ContentObject with one network per job, named by permutation.
    fn permutation_object(&self, content: &mut XmlElement, role: JobRole, object_type: &str, output: bool) {
        let jobs = self.jobs(role);
        if jobs.is_empty() {
            return;
        }
        let object = content.push(XmlElement::new("ContentObject").attr("Name", "").attr("Type", object_type));
        for job in jobs {
            object.push(self.network(job.permutation.clone(), job));
        }
        let outputs = object.push(XmlElement::new("OutputTagCollection"));
        if output {
            outputs.push(XmlElement::text_node("OutputTag", self.tag_path.clone()).attr("Type", object_type));
        }
    }

    fn model_contents(&self, contents: &mut XmlElement) {
        let content = contents.push(
            XmlElement::new("Content")
                .attr("Name", self.scene.asset.name.clone())
                .attr("VerifyAnimation", "")
                .attr("Type", "model"),
        );
        self.permutation_object(content, JobRole::Render, "render_model", true);
        self.permutation_object(content, JobRole::Physics, "physics_model", true);
        self.permutation_object(content, JobRole::Collision, "collision_model", true);
        self.permutation_object(content, JobRole::Skeleton, "skeleton", false);
        self.permutation_object(content, JobRole::Markers, "markers", false);
        self.animation_graph(content);
    }

    fn sky_contents(&self, contents: &mut XmlElement) {
        let content = contents.push(
            XmlElement::new("Content")
                .attr("Name", self.scene.asset.name.clone())
                .attr("Type", "model"),
        );
        self.permutation_object(content, JobRole::Sky, "render_model", true);
        self.permutation_object(content, JobRole::Skeleton, "skeleton", false);
        self.permutation_object(content, JobRole::Markers, "markers", false);
    }

    fn animation_contents(&self, contents: &mut XmlElement) {
        let content = contents.push(
            XmlElement::new("Content")
                .attr("Name", self.scene.asset.name.clone())
                .attr("Type", "model"),
        );
        self.permutation_object(content, JobRole::Render, "render_model", true);
        self.permutation_object(content, JobRole::Skeleton, "skeleton", false);
        self.animation_graph(content);
    }

    fn scenario_contents(&self, contents: &mut XmlElement) {
        let asset_dir = windows_path(&self.scene.asset.directory);
        for (role, content_type, object_type, design) in [
            (JobRole::Structure, "bsp", "scenario_structure_bsp", false),
            (JobRole::Design, "design", "structure_design", true),
        ] {
            let jobs = self.jobs(role);
            let mut bsps: Vec<&str> = Vec::new();
            for job in &jobs {
                if let Some(bsp) = job.bsp.as_deref() {
                    if !bsps.contains(&bsp) {
                        bsps.push(bsp);
                    }
                }
            }
            for bsp in bsps {
                let object = contents
                    .push(XmlElement::new("Content").attr("Name", bsp).attr("Type", content_type))
                    .push(XmlElement::new("ContentObject").attr("Name", "").attr("Type", object_type));
                for job in jobs.iter().filter(|j| j.bsp.as_deref() == Some(bsp)) {
                    object.push(self.network(self.bsp_network_name(job, design), job));
                }
                let outputs = object.push(XmlElement::new("OutputTagCollection"));
                let tag_path = format!("{}\\{}", asset_dir, bsp);
                if design {
                    outputs.push(XmlElement::text_node("OutputTag", tag_path).attr("Type", "structure_design"));
                } else {
                    outputs.push(XmlElement::text_node("OutputTag", tag_path.clone()).attr("Type", "scenario_structure_bsp"));
                    outputs.push(
                        XmlElement::text_node("OutputTag", tag_path).attr("Type", "scenario_structure_lighting_info"),
                    );
                }
            }
        }
    }

    fn decorator_contents(&self, contents: &mut XmlElement) {
        let content = contents.push(
            XmlElement::new("Content")
                .attr("Name", self.scene.asset.name.clone())
                .attr("Type", "decorator_set"),
        );
        let mut jobs = self.jobs(JobRole::Decorator);
        jobs.sort_by_key(|j| j.lod);
        for job in jobs {
            let lod = job.lod.unwrap_or(1);
            let index = (lod.saturating_sub(1)).to_string();
            let object = content.push(
                XmlElement::new("ContentObject")
                    .attr("Name", index.clone())
                    .attr("Type", "render_model")
                    .attr("LOD", index),
            );
            object.push(self.network(job.permutation.clone(), job));
            object
                .push(XmlElement::new("OutputTagCollection"))
                .push(XmlElement::text_node("OutputTag", format!("{}_lod{}", self.tag_path, lod)).attr("Type", "render_model"));
        }
    }

    fn particle_contents(&self, contents: &mut XmlElement) {
        let content = contents.push(
            XmlElement::new("Content")
                .attr("Name", self.scene.asset.name.clone())
                .attr("Type", "particle_model"),
        );
        self.permutation_object(content, JobRole::ParticleModel, "particle_model", false);
        if self.settings.particle_uses_custom_points {
            if let Some(output) = content
                .children
                .last_mut()
                .and_then(|o| o.children.iter_mut().find(|c| c.name == "OutputTagCollection"))
            {
                output.push(
                    XmlElement::text_node("OutputTag", self.tag_path.clone()).attr("Type", "particle_emitter_custom_points"),
                );
            }
        }
    }

    fn prefab_contents(&self, contents: &mut XmlElement) {
        let content = contents.push(
            XmlElement::new("Content")
                .attr("Name", self.scene.asset.name.clone())
                .attr("Type", "prefab"),
        );
        let jobs = self.jobs(JobRole::Prefab);
        if jobs.is_empty() {
            return;
        }
        let object = content.push(
            XmlElement::new("ContentObject")
                .attr("Name", "")
                .attr("Type", "scenario_structure_bsp"),
        );
        for job in jobs {
            object.push(self.network(self.bsp_network_name(job, false), job));
        }
        let outputs = object.push(XmlElement::new("OutputTagCollection"));
        outputs.push(XmlElement::text_node("OutputTag", self.tag_path.clone()).attr("Type", "scenario_structure_bsp"));
        outputs.push(
            XmlElement::text_node("OutputTag", self.tag_path.clone()).attr("Type", "scenario_structure_lighting_info"),
        );
    }

    fn animation_graph(&self, content: &mut XmlElement) {
        let jobs = self.jobs(JobRole::Animation);
        if jobs.is_empty() {
            return;
        }
        let object = content.push(
            XmlElement::new("ContentObject")
                .attr("Name", "")
                .attr("Type", "model_animation_graph"),
        );
        let mut clips: Vec<&AnimationClip> = Vec::new();
        for job in &jobs {
            let Some(clip) = job
                .clip
                .as_deref()
                .and_then(|name| self.scene.animations.iter().find(|a| a.name == name))
            else {
                continue;
            };
            let mut network = animation_network(clip, self.corinth());
            self.network_files(&mut network, job);
            object.push(network);
            clips.push(clip);
        }
        for clip in &clips {
            for rename in &clip.renames {
                object.push(
                    XmlElement::new("ContentNetwork")
                        .attr("Name", rename.clone())
                        .attr("Type", "Rename")
                        .attr("NetworkReference", clip.name.clone()),
                );
            }
        }

        let outputs = object.push(XmlElement::new("OutputTagCollection"));
        outputs.push(XmlElement::text_node("OutputTag", self.tag_path.clone()).attr("Type", "frame_event_list"));
        if self.corinth() {
            outputs.push(XmlElement::text_node("OutputTag", self.tag_path.clone()).attr("Type", "pca_animation"));
        }
        outputs.push(XmlElement::text_node("OutputTag", self.tag_path.clone()).attr("Type", "model_animation_graph"));
    }
}

/// ContentNetwork attributes for one animation clip.
pub fn animation_network(clip: &AnimationClip, corinth: bool) -> XmlElement {
    let mut network = XmlElement::new("ContentNetwork")
        .attr("Name", clip.name.clone())
        .attr("Type", "Base");
    match clip.kind {
        AnimationKind::Overlay => {
            network.set_attr("Type", "Overlay");
            network.set_attr("ModelAnimationOverlayBlending", "Additive");
            network.set_attr(
                "ModelAnimationOverlayType",
                if clip.pose_overlay { "Pose" } else { "Keyframe" },
            );
        }
        AnimationKind::World if corinth => {
            network.set_attr("Type", "World");
            network.set_attr("ModelAnimationMovementData", "XYZAbsolute");
        }
        AnimationKind::Replacement => {
            network.set_attr("Type", "Overlay");
            network.set_attr("ModelAnimationOverlayType", "Keyframe");
            network.set_attr(
                "ModelAnimationOverlayBlending",
                match clip.space {
                    AnimationSpace::Object => "ReplacementObjectSpace",
                    AnimationSpace::Local => "ReplacementLocalSpace",
                },
            );
        }
        _ => {
            let movement = match clip.movement {
                Movement::World => None,
                Movement::None => Some("None"),
                Movement::Xy => Some("XY"),
                Movement::XyYaw => Some("XYYaw"),
                Movement::XyzYaw => Some("XYZYaw"),
                Movement::Full => Some("XYZFullRotation"),
            };
            if let Some(movement) = movement {
                network.set_attr("ModelAnimationMovementData", movement);
            }
        }
    }
    if let Some(compression) = clip.compression.as_deref().filter(|c| *c != "Default") {
        network.set_attr("Compression", compression);
    }
    if corinth && clip.pca {
        network.set_attr("PCA", "True");
    }
    network
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
