//! Skeleton resolution.

use serde::{Deserialize, Serialize};

use crate::error::{ForgeError, Result};
use crate::scene::{Armature, Bone};

/// Frame IDs every exported skeleton root carries.
pub const FRAME_ID1: u32 = 8078;
pub const FRAME_ID2: u32 = 378163771;

/// Name of the armature made when the scene has none.
pub const SYNTHESIZED_ARMATURE: &str = "Armature";
/// Root bone of a synthesized armature.
pub const SYNTHESIZED_ROOT: &str = "pedestal";

/// The single skeleton an export is bound to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub name: String,
    pub bones: Vec<Bone>,
    pub root: String,
    pub frame_ids: (u32, u32),
    /// Corinth marks the skeleton root as the world frame.
    pub world_frame: bool,
    pub synthesized: bool,
}

impl Skeleton {
    /// Use the scene armature, or make a one-bone skeleton when there is none.
    pub fn resolve(armature: Option<&Armature>, corinth: bool) -> Result<Self> {
        let (name, bones, synthesized) = match armature {
            Some(armature) if !armature.bones.is_empty() => (armature.name.clone(), armature.bones.clone(), false),
            Some(armature) => (armature.name.clone(), vec![root_bone()], true),
            None => (SYNTHESIZED_ARMATURE.to_string(), vec![root_bone()], true),
        };

        let roots: Vec<&Bone> = bones.iter().filter(|b| b.parent.is_none()).collect();
        if roots.len() != 1 {
            return Err(ForgeError::MultipleRootBones {
                armature: name,
                count: roots.len(),
            });
        }
        let root = roots[0].name.clone();

        Ok(Self {
            name,
            bones,
            root,
            frame_ids: (FRAME_ID1, FRAME_ID2),
            world_frame: corinth,
            synthesized,
        })
    }

    /// Names object names may not take.
    pub fn protected_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.bones.iter().map(|b| b.name.as_str()))
    }

    pub fn has_bone(&self, name: &str) -> bool {
        self.bones.iter().any(|b| b.name == name)
    }
}

fn root_bone() -> Bone {
    Bone {
        name: SYNTHESIZED_ROOT.to_string(),
        parent: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(name: &str, parent: Option<&str>) -> Bone {
        Bone {
            name: name.into(),
            parent: parent.map(Into::into),
        }
    }

    #[test]
    fn test_synthesizes_when_missing() {
        let skeleton = Skeleton::resolve(None, true).unwrap();
        assert!(skeleton.synthesized);
        assert_eq!(skeleton.root, SYNTHESIZED_ROOT);
        assert_eq!(skeleton.frame_ids, (8078, 378163771));
        assert!(skeleton.world_frame);
    }

    #[test]
    fn test_uses_scene_armature() {
        let armature = Armature {
            name: "rig".into(),
            bones: vec![bone("pedestal", None), bone("pelvis", Some("pedestal"))],
        };
        let skeleton = Skeleton::resolve(Some(&armature), false).unwrap();
        assert!(!skeleton.synthesized);
        assert!(!skeleton.world_frame);
        assert!(skeleton.has_bone("pelvis"));
        assert_eq!(skeleton.protected_names().count(), 3);
    }

    #[test]
    fn test_multiple_roots_is_fatal() {
        let armature = Armature {
            name: "rig".into(),
            bones: vec![bone("a", None), bone("b", None)],
        };
        let err = Skeleton::resolve(Some(&armature), false).unwrap_err();
        assert!(matches!(err, ForgeError::MultipleRootBones { count: 2, .. }));
    }
}
