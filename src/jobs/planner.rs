//! Expanding a normalized scene into export jobs.

use std::collections::HashSet;
use std::path::PathBuf;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::paths::{animation_paths, model_paths, JobPaths, JobRole};
use crate::config::ExportSettings;
use crate::error::{ForgeError, Result};
use crate::normalize::{Bucket, NormalizedScene};
use crate::scene::{AssetCategory, DEFAULT_NAME};

/// Which permutations and BSPs are converted this run. Empty lists select
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobFilter {
    pub permutations: Vec<String>,
    pub bsps: Vec<String>,
}

impl JobFilter {
    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self {
            permutations: settings.selected_permutations.clone(),
            bsps: settings.selected_bsps.clone(),
        }
    }

    pub fn allows_permutation(&self, permutation: &str) -> bool {
        self.permutations.is_empty() || self.permutations.iter().any(|p| p == permutation)
    }

    pub fn allows_bsp(&self, bsp: &str) -> bool {
        self.bsps.is_empty() || self.bsps.iter().any(|b| b == bsp)
    }
}

/// One interchange/metadata/compiled triple and the objects it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportJob {
    pub role: JobRole,
    pub permutation: String,
    pub bsp: Option<String>,
    /// Decorator level of detail, 1 is the highest.
    pub lod: Option<u8>,
    /// Animation clip name for animation jobs.
    pub clip: Option<String>,
    /// Indices into [`NormalizedScene::objects`].
    pub objects: Vec<usize>,
    pub paths: JobPaths,
    /// False when the selection filter excludes the job from conversion.
    pub dispatch: bool,
}

impl ExportJob {
    fn new(role: JobRole, permutation: &str, paths: JobPaths) -> Self {
        Self {
            role,
            permutation: permutation.to_string(),
            bsp: None,
            lod: None,
            clip: None,
            objects: Vec::new(),
            paths,
            dispatch: true,
        }
    }

    /// Short description used in progress output.
    pub fn label(&self) -> String {
        if let Some(clip) = &self.clip {
            return clip.clone();
        }
        let mut label = String::new();
        if let Some(bsp) = &self.bsp {
            label.push_str(bsp);
            label.push(' ');
        }
        if self.permutation != DEFAULT_NAME {
            label.push_str(&self.permutation);
            label.push(' ');
        }
        if let Some(lod) = self.lod {
            label.push_str(&format!("lod{} ", lod));
        }
        label.push_str(self.role.as_str());
        label
    }
}

/// Ordered job list for one asset export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPlan {
    pub jobs: Vec<ExportJob>,
}

impl JobPlan {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExportJob> {
        self.jobs.iter()
    }

    /// Jobs that will be converted this run.
    pub fn dispatched(&self) -> impl Iterator<Item = &ExportJob> {
        self.jobs.iter().filter(|j| j.dispatch)
    }

    pub fn with_role(&self, role: JobRole) -> impl Iterator<Item = &ExportJob> {
        self.jobs.iter().filter(move |j| j.role == role)
    }

    /// Compiled container paths of every dispatched job.
    pub fn compiled_paths(&self) -> Vec<PathBuf> {
        self.dispatched().map(|j| j.paths.compiled.clone()).collect()
    }
}

/// Builds a [`JobPlan`] from a [`NormalizedScene`].
pub struct JobPlanner {
    filter: JobFilter,
}

impl JobPlanner {
    pub fn new(filter: JobFilter) -> Self {
        Self { filter }
    }

    pub fn plan(&self, scene: &NormalizedScene) -> Result<JobPlan> {
        let mut jobs = Vec::new();
        match scene.category() {
            AssetCategory::Model => {
                self.animation_jobs(scene, &mut jobs);
                for (bucket, role) in [
                    (Bucket::Render, JobRole::Render),
                    (Bucket::Collision, JobRole::Collision),
                    (Bucket::Physics, JobRole::Physics),
                ] {
                    self.permutation_jobs(scene, bucket, role, &mut jobs);
                }
                self.single_job(scene, Bucket::Markers, JobRole::Markers, &mut jobs);
                self.skeleton_job(scene, &mut jobs);
            }
            AssetCategory::Animation => {
                self.animation_jobs(scene, &mut jobs);
                self.permutation_jobs(scene, Bucket::Render, JobRole::Render, &mut jobs);
                self.skeleton_job(scene, &mut jobs);
            }
            AssetCategory::Sky => {
                self.single_job(scene, Bucket::Render, JobRole::Sky, &mut jobs);
                self.single_job(scene, Bucket::Markers, JobRole::Markers, &mut jobs);
                self.skeleton_job(scene, &mut jobs);
            }
            AssetCategory::Scenario => {
                self.bsp_jobs(scene, Bucket::Structure, JobRole::Structure, &mut jobs);
                self.bsp_jobs(scene, Bucket::Design, JobRole::Design, &mut jobs);
            }
            AssetCategory::Prefab => {
                self.single_job(scene, Bucket::Structure, JobRole::Prefab, &mut jobs);
            }
            AssetCategory::DecoratorSet => self.decorator_jobs(scene, &mut jobs),
            AssetCategory::ParticleModel => {
                self.single_job(scene, Bucket::Render, JobRole::ParticleModel, &mut jobs);
            }
        }

        check_unique(&jobs)?;
        info!(
            "Planned {} export jobs ({} dispatched)",
            jobs.len(),
            jobs.iter().filter(|j| j.dispatch).count()
        );
        Ok(JobPlan { jobs })
    }

    fn indices<'a>(
        scene: &'a NormalizedScene,
        bucket: Bucket,
    ) -> impl Iterator<Item = (usize, &'a crate::scene::ExportObject)> + 'a {
        scene
            .objects
            .iter()
            .enumerate()
            .filter(move |(_, o)| o.bucket == bucket)
            .map(|(i, o)| (i, &o.object))
    }

    /// One job per permutation with objects in `bucket`.
    fn permutation_jobs(&self, scene: &NormalizedScene, bucket: Bucket, role: JobRole, jobs: &mut Vec<ExportJob>) {
        for permutation in scene.permutations_in(bucket) {
            let paths = model_paths(&scene.asset.directory, &scene.asset.name, role, &permutation, None);
            let mut job = ExportJob::new(role, &permutation, paths);
            job.objects = Self::indices(scene, bucket)
                .filter(|(_, o)| o.permutation == permutation)
                .map(|(i, _)| i)
                .collect();
            job.dispatch = self.filter.allows_permutation(&permutation);
            debug!("Job {} with {} objects", job.label(), job.objects.len());
            jobs.push(job);
        }
    }

    /// One job holding every object in `bucket`, if there are any.
    fn single_job(&self, scene: &NormalizedScene, bucket: Bucket, role: JobRole, jobs: &mut Vec<ExportJob>) {
        let objects: Vec<usize> = Self::indices(scene, bucket).map(|(i, _)| i).collect();
        if objects.is_empty() {
            return;
        }
        let paths = model_paths(&scene.asset.directory, &scene.asset.name, role, DEFAULT_NAME, None);
        let mut job = ExportJob::new(role, DEFAULT_NAME, paths);
        job.objects = objects;
        jobs.push(job);
    }

    /// The skeleton job always exists: the armature itself is its content.
    fn skeleton_job(&self, scene: &NormalizedScene, jobs: &mut Vec<ExportJob>) {
        let paths = model_paths(
            &scene.asset.directory,
            &scene.asset.name,
            JobRole::Skeleton,
            DEFAULT_NAME,
            None,
        );
        let mut job = ExportJob::new(JobRole::Skeleton, DEFAULT_NAME, paths);
        job.objects = Self::indices(scene, Bucket::Skeleton).map(|(i, _)| i).collect();
        jobs.push(job);
    }

    /// One job per (BSP, permutation) pair that holds objects.
    fn bsp_jobs(&self, scene: &NormalizedScene, bucket: Bucket, role: JobRole, jobs: &mut Vec<ExportJob>) {
        for bsp in scene.bsps_in(bucket) {
            for permutation in &scene.permutations {
                let objects: Vec<usize> = Self::indices(scene, bucket)
                    .filter(|(_, o)| o.bsp.as_deref() == Some(bsp.as_str()) && o.permutation == *permutation)
                    .map(|(i, _)| i)
                    .collect();
                if objects.is_empty() {
                    continue;
                }
                let paths = model_paths(&scene.asset.directory, &scene.asset.name, role, permutation, Some(&bsp));
                let mut job = ExportJob::new(role, permutation, paths);
                job.bsp = Some(bsp.clone());
                job.objects = objects;
                job.dispatch = self.filter.allows_bsp(&bsp) && self.filter.allows_permutation(permutation);
                jobs.push(job);
            }
        }
    }

    /// One job per decorator level of detail.
    fn decorator_jobs(&self, scene: &NormalizedScene, jobs: &mut Vec<ExportJob>) {
        for &lod in &scene.decorator_lods {
            let objects: Vec<usize> = Self::indices(scene, Bucket::Render)
                .filter(|(_, o)| o.props.decorator_lod == Some(lod))
                .map(|(i, _)| i)
                .collect();
            let stem = format!("{}_decorator_lod{}", scene.asset.name, lod);
            let paths = JobPaths::new(&scene.asset.directory, "models", &stem);
            let mut job = ExportJob::new(JobRole::Decorator, DEFAULT_NAME, paths);
            job.lod = Some(lod);
            job.objects = objects;
            jobs.push(job);
        }
    }

    /// One job per animation clip; clips not flagged for export stay in the
    /// plan so the manifest keeps referencing their last build.
    fn animation_jobs(&self, scene: &NormalizedScene, jobs: &mut Vec<ExportJob>) {
        let skeleton: Vec<usize> = Self::indices(scene, Bucket::Skeleton).map(|(i, _)| i).collect();
        for clip in &scene.animations {
            let paths = animation_paths(&scene.asset.directory, &clip.name);
            let mut job = ExportJob::new(JobRole::Animation, DEFAULT_NAME, paths);
            job.clip = Some(clip.name.clone());
            job.objects = skeleton.clone();
            job.dispatch = clip.export;
            jobs.push(job);
        }
    }
}

fn check_unique(jobs: &[ExportJob]) -> Result<()> {
    let mut seen = HashSet::new();
    for job in jobs {
        for path in [&job.paths.interchange, &job.paths.compiled] {
            if !seen.insert(path.clone()) {
                return Err(ForgeError::DuplicateJobPath { path: path.clone() });
            }
        }
    }
    Ok(())
}
