//! Face layers: named face masks carrying property overrides.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::props::FaceOverrides;
use crate::error::SceneWarning;

/// A named boolean mask over a mesh's faces.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceLayer {
    pub name: String,
    pub faces: BTreeSet<u32>,
    #[serde(default)]
    pub overrides: FaceOverrides,
}

impl FaceLayer {
    pub fn new(name: impl Into<String>, faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            name: name.into(),
            faces: faces.into_iter().collect(),
            overrides: FaceOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: FaceOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

/// Ordered face layers of one mesh. Iteration order is authoring order and
/// drives both signature ordering and override application.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceLayerStore {
    layers: Vec<FaceLayer>,
}

impl FaceLayerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: FaceLayer) {
        self.layers.push(layer);
    }

    pub fn get(&self, index: usize) -> Option<&FaceLayer> {
        self.layers.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FaceLayer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Face sets of every layer restricted to `face_count`, with a warning for
    /// each layer that referenced faces the mesh no longer has.
    pub fn resolve(&self, mesh_name: &str, face_count: usize) -> (Vec<BTreeSet<u32>>, Vec<SceneWarning>) {
        let mut warnings = Vec::new();
        let sets = self
            .layers
            .iter()
            .map(|layer| {
                let (valid, dangling): (BTreeSet<u32>, BTreeSet<u32>) =
                    layer.faces.iter().partition(|&&f| (f as usize) < face_count);
                if !dangling.is_empty() {
                    warnings.push(SceneWarning::DanglingFaceIndices {
                        mesh: mesh_name.to_string(),
                        layer: layer.name.clone(),
                        count: dangling.len(),
                    });
                }
                valid
            })
            .collect();
        (sets, warnings)
    }
}

impl FromIterator<FaceLayer> for FaceLayerStore {
    fn from_iter<I: IntoIterator<Item = FaceLayer>>(iter: I) -> Self {
        Self {
            layers: iter.into_iter().collect(),
        }
    }
}
