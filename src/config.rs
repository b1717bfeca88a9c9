//! Export settings
//!
//! Settings are read from a JSON file where every field is optional, then
//! environment overrides are applied on top.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};

/// Default delay before the last synchronous conversion retry.
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;

/// Environment variable overriding the data directory.
pub const ENV_DATA_DIR: &str = "TAGFORGE_DATA_DIR";
/// Environment variable overriding the tags directory.
pub const ENV_TAGS_DIR: &str = "TAGFORGE_TAGS_DIR";
/// Environment variable overriding the tool executable.
pub const ENV_TOOL: &str = "TAGFORGE_TOOL";
/// Environment variable overriding the conversion pool size.
pub const ENV_POOL_SIZE: &str = "TAGFORGE_POOL_SIZE";

/// Game engine generation the export targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Legacy engine: compiled containers need the header patch.
    #[default]
    Reach,
    Corinth,
}

impl Target {
    pub fn is_corinth(self) -> bool {
        self == Target::Corinth
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reach => write!(f, "reach"),
            Self::Corinth => write!(f, "corinth"),
        }
    }
}

/// Editing kit locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPaths {
    /// Root of the source data tree; asset directories are relative to it.
    pub data_dir: PathBuf,
    /// Root of the compiled tags tree.
    pub tags_dir: PathBuf,
    /// The tool executable, run with the project root as working directory.
    pub tool: PathBuf,
}

impl Default for ProjectPaths {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tags_dir: PathBuf::from("tags"),
            tool: PathBuf::from("tool"),
        }
    }
}

impl ProjectPaths {
    /// Project root: the parent of the data directory.
    pub fn project_root(&self) -> PathBuf {
        self.data_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Flags passed to the tag compiler's import verb.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportFlags {
    pub force: bool,
    pub skip_instances: bool,
    // corinth only
    pub lighting: bool,
    pub meta_only: bool,
    pub disable_hulls: bool,
    pub disable_collision: bool,
    pub no_pca: bool,
    pub force_animations: bool,
    // legacy only
    pub draft: bool,
    pub seam_debug: bool,
    pub decompose_instances: bool,
    pub suppress_errors: bool,
}

/// Legacy lightmap quality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightmapQuality {
    #[default]
    Direct,
    Draft,
    Low,
    Medium,
    High,
    SuperSlow,
}

impl LightmapQuality {
    /// Name understood by `faux_farm_begin`.
    pub fn farm_name(self) -> &'static str {
        match self {
            Self::Direct => "direct_only",
            Self::Draft => "draft",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::SuperSlow => "super_slow",
        }
    }
}

/// Lightmap stage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightmapSettings {
    pub enabled: bool,
    pub quality: LightmapQuality,
    /// Corinth settings preset name; `__custom__` and `__asset__` use the asset's own settings.
    pub corinth_quality: String,
    pub all_bsps: bool,
    pub specific_bsp: String,
    /// Farm process count, defaults to the host parallelism.
    pub threads: Option<usize>,
}

impl Default for LightmapSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            quality: LightmapQuality::default(),
            corinth_quality: "__custom__".to_string(),
            all_bsps: true,
            specific_bsp: "default".to_string(),
            threads: None,
        }
    }
}

/// Everything an export needs besides the scene itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub project: ProjectPaths,
    pub target: Target,
    /// Conversion worker count; `None` uses the host core count.
    pub pool_size: Option<usize>,
    /// Convert one job at a time on the coordinating thread.
    pub slow_conversion: bool,
    pub retry_delay_ms: u64,
    /// Permutations to dispatch; empty means all.
    pub selected_permutations: Vec<String>,
    /// BSPs to dispatch and import; empty means all.
    pub selected_bsps: Vec<String>,
    /// Run the tag compiler after conversion.
    pub build_tags: bool,
    pub import: ImportFlags,
    pub lightmap: LightmapSettings,
    /// High level object tags a model should produce (biped, crate, scenery...).
    pub output_tags: Vec<String>,
    pub particle_uses_custom_points: bool,
    /// Tag reference overrides applied after import, keyed by reference field.
    pub tag_overrides: BTreeMap<String, String>,
    /// Node usage assignments written to the animation graph, keyed by usage.
    pub node_usages: BTreeMap<String, String>,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            project: ProjectPaths::default(),
            target: Target::default(),
            pool_size: None,
            slow_conversion: false,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            selected_permutations: Vec::new(),
            selected_bsps: Vec::new(),
            build_tags: true,
            import: ImportFlags::default(),
            lightmap: LightmapSettings::default(),
            output_tags: Vec::new(),
            particle_uses_custom_points: false,
            tag_overrides: BTreeMap::new(),
            node_usages: BTreeMap::new(),
        }
    }
}

impl ExportSettings {
    /// Load settings from a JSON file and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| ForgeError::SettingsLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut settings: ExportSettings = serde_json::from_str(&content)?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Defaults plus environment overrides, for runs without a settings file.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.apply_env_overrides();
        settings
    }

    /// Apply `TAGFORGE_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            self.project.data_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(ENV_TAGS_DIR) {
            self.project.tags_dir = PathBuf::from(dir);
        }
        if let Ok(tool) = std::env::var(ENV_TOOL) {
            self.project.tool = PathBuf::from(tool);
        }
        if let Some(size) = std::env::var(ENV_POOL_SIZE)
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
        {
            self.pool_size = Some(size);
        }
    }

    /// Resolved conversion worker count.
    pub fn worker_count(&self) -> usize {
        self.pool_size.filter(|&n| n > 0).unwrap_or_else(host_parallelism)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn is_corinth(&self) -> bool {
        self.target.is_corinth()
    }
}

/// Number of hardware threads, at least one.
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use test_case::test_case;

    #[test]
    fn test_defaults() {
        let settings = ExportSettings::default();
        assert_eq!(settings.target, Target::Reach);
        assert_eq!(settings.retry_delay(), Duration::from_millis(2000));
        assert!(settings.build_tags);
        assert!(settings.worker_count() >= 1);
    }

    #[test]
    fn test_load_partial_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "target": "corinth", "pool_size": 3, "selected_bsps": ["010"] }"#,
        )
        .unwrap();

        let settings = ExportSettings::load(&path).unwrap();
        assert!(settings.is_corinth());
        assert_eq!(settings.selected_bsps, vec!["010".to_string()]);
        assert_eq!(settings.lightmap.corinth_quality, "__custom__");
        assert_eq!(settings.retry_delay_ms, DEFAULT_RETRY_DELAY_MS);
    }

    #[test]
    fn test_load_missing_file() {
        let temp = tempdir().unwrap();
        let result = ExportSettings::load(&temp.path().join("nope.json"));
        assert!(matches!(result, Err(ForgeError::SettingsLoad { .. })));
    }

    #[test]
    fn test_zero_pool_size_falls_back_to_host() {
        let settings = ExportSettings {
            pool_size: Some(0),
            ..Default::default()
        };
        assert_eq!(settings.worker_count(), host_parallelism());
    }

    #[test]
    fn test_project_root_is_data_parent() {
        let paths = ProjectPaths {
            data_dir: PathBuf::from("/kits/reach/data"),
            ..Default::default()
        };
        assert_eq!(paths.project_root(), PathBuf::from("/kits/reach"));
    }

    #[test_case(LightmapQuality::Direct, "direct_only")]
    #[test_case(LightmapQuality::Draft, "draft")]
    #[test_case(LightmapQuality::Low, "low")]
    #[test_case(LightmapQuality::Medium, "medium")]
    #[test_case(LightmapQuality::High, "high")]
    #[test_case(LightmapQuality::SuperSlow, "super_slow")]
    fn test_quality_farm_names(quality: LightmapQuality, expected: &str) {
        assert_eq!(quality.farm_name(), expected);
    }
}
