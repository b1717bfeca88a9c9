//! Back-facing seam generation for scenarios.

use std::sync::Arc;

use crate::error::SceneWarning;
use crate::scene::{ExportObject, MeshType};

/// Seam settings authored on a seam object.
#[derive(Debug, Clone, PartialEq)]
pub struct SeamSource {
    pub name: String,
    pub seam_back: Option<String>,
    /// The artist placed the back seam by hand.
    pub manual: bool,
}

fn is_shared(bsp: &str) -> bool {
    bsp.trim().eq_ignore_ascii_case("shared")
}

fn is_seam(object: &ExportObject) -> bool {
    object.kind.mesh_type() == Some(MeshType::Seam)
}

/// Add a flipped copy of every seam facing into the adjacent BSP.
///
/// Does nothing unless the scenario has at least two non-shared BSPs. A seam
/// whose back BSP is unset or invalid uses the BSP of the nearest geometry in
/// another BSP; a seam with no such neighbour is removed.
pub fn build_seams(
    asset_name: &str,
    regions: &[String],
    sources: &[SeamSource],
    objects: &mut Vec<ExportObject>,
    warnings: &mut Vec<SceneWarning>,
) {
    if regions.iter().filter(|r| !is_shared(r)).count() < 2 {
        return;
    }

    for source in sources.iter().filter(|s| !s.manual) {
        let Some(index) = objects.iter().position(|o| o.name == source.name && is_seam(o)) else {
            continue;
        };
        let seam = &objects[index];
        let front = seam.bsp.clone().unwrap_or_else(|| "default".to_string());

        let back = match &source.seam_back {
            Some(back) if !back.is_empty() && *back != front && regions.contains(back) => back.clone(),
            _ => match nearest_other_bsp(seam, objects, &front) {
                Some(bsp) => {
                    warnings.push(SceneWarning::SeamBackReplaced {
                        seam: seam.name.clone(),
                        bsp: bsp.clone(),
                    });
                    bsp
                }
                None => {
                    warnings.push(SceneWarning::SeamRemoved {
                        seam: seam.name.clone(),
                    });
                    objects.remove(index);
                    continue;
                }
            },
        };

        let mut back_seam = seam.clone();
        back_seam.mesh = seam.mesh.as_ref().map(|m| Arc::new(m.flipped()));
        back_seam.normals = None;
        back_seam.name = format!("seam({}:{})", back, front);
        back_seam.props.seam_associated_bsp = Some(format!("{}_{}", asset_name, back));
        back_seam.bsp = Some(back);
        objects.push(back_seam);
    }
}

fn nearest_other_bsp(seam: &ExportObject, objects: &[ExportObject], front: &str) -> Option<String> {
    let origin = seam.world_centroid();
    objects
        .iter()
        .filter(|o| o.mesh.is_some() && !is_seam(o))
        .filter_map(|o| {
            let bsp = o.bsp.as_deref()?;
            (bsp != front && !is_shared(bsp)).then(|| (bsp, o.world_centroid().distance_squared(origin)))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(bsp, _)| bsp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::mesh::tests::quad_strip;
    use crate::scene::ExportKind;
    use glam::Vec3;

    fn object(name: &str, mesh_type: MeshType, bsp: &str, x: f32) -> ExportObject {
        let mut o = ExportObject::new(name, ExportKind::Mesh(mesh_type));
        o.mesh = Some(Arc::new(quad_strip(1)));
        o.bsp = Some(bsp.to_string());
        o.transform.translation = Vec3::new(x, 0.0, 0.0);
        o
    }

    fn regions() -> Vec<String> {
        vec!["010".into(), "020".into(), "030".into(), "shared".into()]
    }

    #[test]
    fn test_valid_back_reference() {
        let mut objects = vec![object("seam_a", MeshType::Seam, "010", 0.0)];
        let sources = vec![SeamSource {
            name: "seam_a".into(),
            seam_back: Some("020".into()),
            manual: false,
        }];
        let mut warnings = Vec::new();
        build_seams("m10", &regions(), &sources, &mut objects, &mut warnings);

        assert!(warnings.is_empty());
        assert_eq!(objects.len(), 2);
        let back = &objects[1];
        assert_eq!(back.name, "seam(020:010)");
        assert_eq!(back.bsp.as_deref(), Some("020"));
        assert_eq!(back.props.seam_associated_bsp.as_deref(), Some("m10_020"));
        let flipped = back.mesh.as_ref().unwrap();
        assert!(flipped.face_normal(0).z < 0.0);
    }

    #[test]
    fn test_bad_reference_uses_nearest_bsp() {
        let mut objects = vec![
            object("seam_a", MeshType::Seam, "010", 0.0),
            object("far", MeshType::Default, "020", 100.0),
            object("near", MeshType::Default, "030", 3.0),
            object("home", MeshType::Default, "010", 0.5),
            object("commons", MeshType::Default, "shared", 0.1),
        ];
        let sources = vec![SeamSource {
            name: "seam_a".into(),
            seam_back: Some("010".into()),
            manual: false,
        }];
        let mut warnings = Vec::new();
        build_seams("m10", &regions(), &sources, &mut objects, &mut warnings);

        assert_eq!(
            warnings,
            vec![SceneWarning::SeamBackReplaced {
                seam: "seam_a".into(),
                bsp: "030".into()
            }]
        );
        assert_eq!(objects.last().unwrap().name, "seam(030:010)");
    }

    #[test]
    fn test_seam_without_neighbour_is_removed() {
        let mut objects = vec![object("seam_a", MeshType::Seam, "010", 0.0)];
        let sources = vec![SeamSource {
            name: "seam_a".into(),
            seam_back: None,
            manual: false,
        }];
        let mut warnings = Vec::new();
        build_seams("m10", &regions(), &sources, &mut objects, &mut warnings);
        assert!(objects.is_empty());
        assert!(matches!(warnings[0], SceneWarning::SeamRemoved { .. }));
    }

    #[test]
    fn test_single_bsp_skips_seams() {
        let mut objects = vec![object("seam_a", MeshType::Seam, "010", 0.0)];
        let sources = vec![SeamSource {
            name: "seam_a".into(),
            seam_back: None,
            manual: false,
        }];
        let mut warnings = Vec::new();
        build_seams("m10", &["010".into(), "shared".into()], &sources, &mut objects, &mut warnings);
        assert_eq!(objects.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_manual_seams_are_left_alone() {
        let mut objects = vec![object("seam_a", MeshType::Seam, "010", 0.0)];
        let sources = vec![SeamSource {
            name: "seam_a".into(),
            seam_back: None,
            manual: true,
        }];
        let mut warnings = Vec::new();
        build_seams("m10", &regions(), &sources, &mut objects, &mut warnings);
        assert_eq!(objects.len(), 1);
    }
}
