//! Output path naming for export jobs.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scene::DEFAULT_NAME;

/// Logical role of a job, which decides its output name and manifest entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRole {
    Render,
    Collision,
    Physics,
    Markers,
    Skeleton,
    Sky,
    Decorator,
    ParticleModel,
    Prefab,
    Structure,
    Design,
    Animation,
}

impl JobRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Collision => "collision",
            Self::Physics => "physics",
            Self::Markers => "markers",
            Self::Skeleton => "skeleton",
            Self::Sky => "sky",
            Self::Decorator => "decorator",
            Self::ParticleModel => "particle_model",
            Self::Prefab => "prefab",
            Self::Structure => "bsp",
            Self::Design => "design",
            Self::Animation => "animations",
        }
    }

    /// Roles written once per asset regardless of permutation.
    pub fn is_asset_wide(self) -> bool {
        matches!(self, Self::Markers | Self::Skeleton)
    }
}

impl std::fmt::Display for JobRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three files one job owns, relative to the data directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobPaths {
    pub interchange: PathBuf,
    pub metadata: PathBuf,
    pub compiled: PathBuf,
}

impl JobPaths {
    /// Paths for `stem`: source files under `{asset_dir}/{subdir}`, the
    /// compiled container under `{asset_dir}/export/{subdir}`.
    pub fn new(asset_dir: &Path, subdir: &str, stem: &str) -> Self {
        let source = asset_dir.join(subdir);
        let compiled = asset_dir.join("export").join(subdir);
        Self {
            interchange: source.join(format!("{}.fbx", stem)),
            metadata: source.join(format!("{}.json", stem)),
            compiled: compiled.join(format!("{}.gr2", stem)),
        }
    }

    /// The same paths rooted at `data_dir`.
    pub fn under(&self, data_dir: &Path) -> Self {
        Self {
            interchange: data_dir.join(&self.interchange),
            metadata: data_dir.join(&self.metadata),
            compiled: data_dir.join(&self.compiled),
        }
    }
}

/// File stem for a model or BSP job.
pub fn model_stem(asset: &str, role: JobRole, permutation: &str, bsp: Option<&str>) -> String {
    let default_perm = permutation == DEFAULT_NAME;
    match (role, bsp) {
        (JobRole::Design, Some(bsp)) if default_perm => format!("{}_{}_design", asset, bsp),
        (JobRole::Design, Some(bsp)) => format!("{}_{}_{}_design", asset, bsp, permutation),
        (_, Some(bsp)) if default_perm => format!("{}_{}", asset, bsp),
        (_, Some(bsp)) => format!("{}_{}_{}", asset, bsp, permutation),
        (JobRole::Prefab | JobRole::ParticleModel, None) => asset.to_string(),
        (_, None) if default_perm || role.is_asset_wide() => format!("{}_{}", asset, role),
        (_, None) => format!("{}_{}_{}", asset, permutation, role),
    }
}

/// Paths for a model or BSP job.
pub fn model_paths(asset_dir: &Path, asset: &str, role: JobRole, permutation: &str, bsp: Option<&str>) -> JobPaths {
    JobPaths::new(asset_dir, "models", &model_stem(asset, role, permutation, bsp))
}

/// Paths for an animation clip job.
pub fn animation_paths(asset_dir: &Path, clip: &str) -> JobPaths {
    JobPaths::new(asset_dir, "animations", clip)
}
