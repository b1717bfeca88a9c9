//! Post-build tag requests
//!
//! After a successful import a few tag fields are written through an
//! external tag API. The exporter only produces requests; what the API does
//! with them is opaque.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ExportSettings;
use crate::error::{ForgeError, Result};
use crate::manifest::windows_path;
use crate::normalize::{Bucket, NormalizedScene};
use crate::scene::{AssetCategory, LightData};

pub const REQUEST_LOG: &str = "tag_requests.jsonl";

/// A light as written into the asset's light tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightEntry {
    pub name: String,
    /// Owning BSP for scenario lights.
    pub bsp: Option<String>,
    pub position: [f32; 3],
    #[serde(flatten)]
    pub data: LightData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum TagRequest {
    /// Point a structure BSP at its lighting info tag.
    SetLightingInfo { bsp: String, lighting_info: String },
    /// Replace one tag reference field on the asset's tag.
    OverrideReference { tag: String, field: String, reference: String },
    WriteNodeUsages {
        graph: String,
        usages: BTreeMap<String, String>,
    },
    WriteLights { tag: String, lights: Vec<LightEntry> },
}

/// The tag read/write collaborator.
pub trait TagApi: Send + Sync {
    fn submit(&self, request: &TagRequest) -> Result<()>;
}

/// Appends each request as one JSON line to a file.
#[derive(Debug, Clone)]
pub struct JsonTagApi {
    path: PathBuf,
}

impl JsonTagApi {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Request log inside `asset_dir`.
    pub fn in_asset_dir(asset_dir: &Path) -> Self {
        Self::new(asset_dir.join(REQUEST_LOG))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TagApi for JsonTagApi {
    fn submit(&self, request: &TagRequest) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(request)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| ForgeError::TagApi {
                reason: format!("{}: {}", self.path.display(), e),
            })?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Requests to send after a successful import, in order.
pub fn post_build_requests(scene: &NormalizedScene, settings: &ExportSettings) -> Vec<TagRequest> {
    let asset_dir = windows_path(&scene.asset.directory);
    let tag_path = format!("{}\\{}", asset_dir, scene.asset.name);
    let category = scene.category();
    let mut requests = Vec::new();

    if category == AssetCategory::Scenario {
        for bsp in scene.bsps_in(Bucket::Structure) {
            let bsp_tag = format!("{}\\{}_{}", asset_dir, scene.asset.name, bsp);
            requests.push(TagRequest::SetLightingInfo {
                lighting_info: format!("{}.scenario_structure_lighting_info", bsp_tag),
                bsp: format!("{}.scenario_structure_bsp", bsp_tag),
            });
        }
    }

    let target_tag = match category {
        AssetCategory::Scenario => format!("{}.scenario", tag_path),
        AssetCategory::Sky | AssetCategory::Model | AssetCategory::Animation => format!("{}.model", tag_path),
        other => format!("{}.{}", tag_path, other.as_str()),
    };
    for (field, reference) in &settings.tag_overrides {
        requests.push(TagRequest::OverrideReference {
            tag: target_tag.clone(),
            field: field.clone(),
            reference: reference.clone(),
        });
    }

    if scene.exported_animations().next().is_some() && !settings.node_usages.is_empty() {
        requests.push(TagRequest::WriteNodeUsages {
            graph: format!("{}.model_animation_graph", tag_path),
            usages: settings.node_usages.clone(),
        });
    }

    let lights: Vec<LightEntry> = scene
        .objects_in(Bucket::Lighting)
        .filter_map(|o| {
            o.light.clone().map(|data| LightEntry {
                name: o.name.clone(),
                bsp: o.bsp.clone(),
                position: o.transform.translation.to_array(),
                data,
            })
        })
        .collect();
    if !lights.is_empty() {
        let tag = if category == AssetCategory::Scenario {
            format!("{}.scenario_light", tag_path)
        } else {
            format!("{}.model_lights", tag_path)
        };
        requests.push(TagRequest::WriteLights { tag, lights });
    }
    requests
}

/// Submit every request, stopping at the first failure.
pub fn submit_all(api: &dyn TagApi, requests: &[TagRequest]) -> Result<()> {
    for request in requests {
        api.submit(request)?;
    }
    if !requests.is_empty() {
        info!("Submitted {} tag requests", requests.len());
    }
    Ok(())
}

/// Placeholder scenery tag for a model asset.
pub fn scenery_tag(tags_dir: &Path, asset_dir: &Path, asset: &str) -> PathBuf {
    tags_dir.join(asset_dir).join(format!("{}.scenery", asset))
}

/// Remove the placeholder scenery tag an import produced. Returns whether a
/// file was removed.
pub fn cull_placeholder_scenery(tags_dir: &Path, asset_dir: &Path, asset: &str) -> Result<bool> {
    let path = scenery_tag(tags_dir, asset_dir, asset);
    if !path.exists() {
        return Ok(false);
    }
    match fs::remove_file(&path) {
        Ok(()) => {
            info!("Removed placeholder scenery tag {}", path.display());
            Ok(true)
        }
        Err(e) => {
            warn!("Failed to remove unused tag {}: {}", path.display(), e);
            Ok(false)
        }
    }
}
