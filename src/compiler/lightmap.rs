//! Lightmap baking through the tool's faux farm verbs.
//!
//! The legacy lightmapper runs as a fixed sequence of phases. Farm phases fan
//! out over `threads` tool processes, each logging to its own file, and are
//! joined and merged before the next phase starts. Corinth bakes in a single
//! tool call.

use std::path::{Path, PathBuf};
use std::thread;

use log::info;

use super::tool::ToolRunner;
use crate::config::{host_parallelism, ExportSettings};
use crate::error::{ForgeError, Result};

const BLOB_DIR_NAME: &str = "111";
const ANALYTICAL_LIGHT: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightmapPhase {
    Sync,
    DirectIllumination,
    PhotonCast,
    ExtendedIllumination,
    FinalGather,
    Finish,
    Done,
}

impl LightmapPhase {
    pub fn next(self) -> Self {
        match self {
            Self::Sync => Self::DirectIllumination,
            Self::DirectIllumination => Self::PhotonCast,
            Self::PhotonCast => Self::ExtendedIllumination,
            Self::ExtendedIllumination => Self::FinalGather,
            Self::FinalGather => Self::Finish,
            Self::Finish | Self::Done => Self::Done,
        }
    }

    /// Farm stage name for phases that fan out.
    pub fn farm_stage(self) -> Option<&'static str> {
        match self {
            Self::DirectIllumination => Some("dillum"),
            Self::PhotonCast => Some("pcast"),
            Self::ExtendedIllumination => Some("radest_extillum"),
            Self::FinalGather => Some("fgather"),
            _ => None,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Sync => "Faux Data Sync",
            Self::DirectIllumination => "Direct Illumination",
            Self::PhotonCast => "Casting Photons",
            Self::ExtendedIllumination => "Extended Illumination",
            Self::FinalGather => "Final Gather",
            Self::Finish => "Faux Farm Process Finalise",
            Self::Done => "Done",
        }
    }
}

/// "direct_only" -> "Direct Only"
fn formalise(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Lightmapper<'a> {
    runner: &'a dyn ToolRunner,
    /// Project root; farm logs are written beneath it.
    project_root: PathBuf,
    /// `{asset_dir}\{asset}`
    scenario: String,
    /// `all` or `{asset}_{bsp}`
    bsp: String,
    quality: String,
    corinth: bool,
    model: bool,
    threads: usize,
}

impl<'a> Lightmapper<'a> {
    pub fn new(runner: &'a dyn ToolRunner, settings: &ExportSettings, scenario: &str, asset: &str, model: bool) -> Self {
        let lightmap = &settings.lightmap;
        let bsp = if lightmap.all_bsps {
            "all".to_string()
        } else {
            format!("{}_{}", asset, lightmap.specific_bsp)
        };
        let quality = if settings.is_corinth() {
            lightmap.corinth_quality.clone()
        } else {
            lightmap.quality.farm_name().to_string()
        };
        Self {
            runner,
            project_root: settings.project.project_root(),
            scenario: scenario.to_string(),
            bsp,
            quality,
            corinth: settings.is_corinth(),
            model,
            threads: lightmap.threads.filter(|&n| n > 0).unwrap_or_else(host_parallelism),
        }
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = root.into();
        self
    }

    /// Bake, returning a completion message.
    pub fn run(&self) -> Result<String> {
        if self.corinth {
            self.run_corinth()
        } else {
            self.run_legacy()
        }
    }

    fn blob_dir(&self) -> String {
        format!("faux\\{}", BLOB_DIR_NAME)
    }

    fn tool(&self, stage: &str, args: &[&str]) -> Result<()> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        if !self.runner.run(&args, None)? {
            return Err(ForgeError::LightmapFailed {
                stage: stage.to_string(),
                log: PathBuf::new(),
            });
        }
        Ok(())
    }

    fn run_legacy(&self) -> Result<String> {
        let mut phase = LightmapPhase::Sync;
        while phase != LightmapPhase::Done {
            info!("{}", phase.title());
            match phase {
                LightmapPhase::Sync => {
                    self.tool("faux_data_sync", &["faux_data_sync", &self.scenario, &self.bsp])?;
                    self.tool(
                        "faux_farm_begin",
                        &[
                            "faux_farm_begin",
                            &self.scenario,
                            &self.bsp,
                            "all",
                            &self.quality,
                            BLOB_DIR_NAME,
                            ANALYTICAL_LIGHT,
                        ],
                    )?;
                }
                LightmapPhase::Finish => {
                    let blob = self.blob_dir();
                    self.tool("faux_farm_finish", &["faux_farm_finish", &blob])?;
                    self.tool(
                        "faux-reorganize-mesh-for-analytical-lights",
                        &["faux-reorganize-mesh-for-analytical-lights", &self.scenario, &self.bsp],
                    )?;
                    self.tool(
                        "faux-build-vmf-textures-from-quadratic",
                        &[
                            "faux-build-vmf-textures-from-quadratic",
                            &self.scenario,
                            &self.bsp,
                            "true",
                            "true",
                        ],
                    )?;
                }
                farm => {
                    if let Some(stage) = farm.farm_stage() {
                        self.farm(stage)?;
                    }
                }
            }
            phase = phase.next();
        }
        Ok(format!("{} Quality lightmap complete", formalise(&self.quality)))
    }

    /// Log file for one farm process, relative to the project root.
    pub fn farm_log(stage: &str, index: usize) -> PathBuf {
        Path::new("faux")
            .join(BLOB_DIR_NAME)
            .join("logs")
            .join(stage)
            .join(format!("{}.txt", index))
    }

    /// Run `stage` across every farm process, then merge.
    fn farm(&self, stage: &str) -> Result<()> {
        let blob = self.blob_dir();
        let verb = format!("faux_farm_{}", stage);
        let count = self.threads.to_string();

        let results: Vec<(usize, Result<bool>)> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.threads)
                .map(|index| {
                    let args = vec![verb.clone(), blob.clone(), index.to_string(), count.clone()];
                    let log = self.project_root.join(Self::farm_log(stage, index));
                    scope.spawn(move || (index, self.runner.run(&args, Some(&log))))
                })
                .collect();
            handles
                .into_iter()
                .enumerate()
                .map(|(index, h)| {
                    h.join().unwrap_or_else(|_| {
                        (
                            index,
                            Err(ForgeError::LightmapFailed {
                                stage: stage.to_string(),
                                log: Self::farm_log(stage, index),
                            }),
                        )
                    })
                })
                .collect()
        });

        for (index, result) in results {
            if !result? {
                return Err(ForgeError::LightmapFailed {
                    stage: stage.to_string(),
                    log: self.project_root.join(Self::farm_log(stage, index)),
                });
            }
        }

        let merge = format!("{}_merge", verb);
        self.tool(&merge, &[&merge, &blob, &count])
    }

    fn run_corinth(&self) -> Result<String> {
        info!("Running Lightmapper");
        let custom = self.quality == "__custom__" || self.quality.is_empty();
        let suppress_dialog = if custom { "false" } else { "true" };
        let force_reatlas = "false";
        let settings = format!("globals\\lightmapper_settings\\{}", self.quality);

        let args: Vec<&str> = if self.model {
            vec!["faux_lightmap_model", self.scenario.as_str(), suppress_dialog, force_reatlas]
        } else if custom || self.quality == "__asset__" {
            vec!["faux_lightmap", self.scenario.as_str(), self.bsp.as_str(), suppress_dialog, force_reatlas]
        } else if self.bsp == "all" {
            vec![
                "faux_lightmap_with_settings_for_all",
                self.scenario.as_str(),
                self.bsp.as_str(),
                suppress_dialog,
                force_reatlas,
                settings.as_str(),
            ]
        } else {
            vec![
                "faux_lightmap_with_settings",
                self.scenario.as_str(),
                self.bsp.as_str(),
                suppress_dialog,
                force_reatlas,
                settings.as_str(),
            ]
        };
        self.tool(args[0], &args)?;
        Ok("Lightmap complete".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LightmapQuality, Target};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::io::BufRead;

    /// Records every invocation; fails any call whose verb matches `fail`.
    #[derive(Default)]
    struct RecordingRunner {
        calls: Mutex<Vec<(Vec<String>, Option<PathBuf>)>>,
        fail: Option<&'static str>,
    }

    impl ToolRunner for RecordingRunner {
        fn run(&self, args: &[String], log: Option<&Path>) -> Result<bool> {
            self.calls.lock().push((args.to_vec(), log.map(Path::to_path_buf)));
            Ok(self.fail != Some(args[0].as_str()))
        }

        fn run_piped(&self, args: &[String], _stderr: &mut dyn FnMut(&mut dyn BufRead) -> Result<()>) -> Result<bool> {
            self.run(args, None)
        }
    }

    impl RecordingRunner {
        fn verbs(&self) -> Vec<String> {
            let mut verbs: Vec<String> = Vec::new();
            for (args, _) in self.calls.lock().iter() {
                if verbs.last() != Some(&args[0]) {
                    verbs.push(args[0].clone());
                }
            }
            verbs
        }
    }

    fn settings(target: Target) -> ExportSettings {
        let mut settings = ExportSettings {
            target,
            ..Default::default()
        };
        settings.lightmap.enabled = true;
        settings.lightmap.threads = Some(3);
        settings
    }

    #[test]
    fn test_phase_order() {
        let mut phase = LightmapPhase::Sync;
        let mut stages = Vec::new();
        while phase != LightmapPhase::Done {
            stages.extend(phase.farm_stage());
            phase = phase.next();
        }
        assert_eq!(stages, vec!["dillum", "pcast", "radest_extillum", "fgather"]);
    }

    #[test]
    fn test_legacy_bake_sequence() {
        let runner = RecordingRunner::default();
        let mut settings = settings(Target::Reach);
        settings.lightmap.quality = LightmapQuality::Medium;
        let message = Lightmapper::new(&runner, &settings, "levels\\test\\crate", "crate", false)
            .with_project_root("/project")
            .run()
            .unwrap();
        assert_eq!(message, "Medium Quality lightmap complete");

        assert_eq!(
            runner.verbs(),
            vec![
                "faux_data_sync",
                "faux_farm_begin",
                "faux_farm_dillum",
                "faux_farm_dillum_merge",
                "faux_farm_pcast",
                "faux_farm_pcast_merge",
                "faux_farm_radest_extillum",
                "faux_farm_radest_extillum_merge",
                "faux_farm_fgather",
                "faux_farm_fgather_merge",
                "faux_farm_finish",
                "faux-reorganize-mesh-for-analytical-lights",
                "faux-build-vmf-textures-from-quadratic",
            ]
        );

        let calls = runner.calls.lock();
        let pcast: Vec<_> = calls.iter().filter(|(a, _)| a[0] == "faux_farm_pcast").collect();
        assert_eq!(pcast.len(), 3);
        let mut logs: Vec<_> = pcast.iter().filter_map(|(_, log)| log.clone()).collect();
        logs.sort();
        assert_eq!(logs[2], PathBuf::from("/project/faux/111/logs/pcast/2.txt"));
        let begin = calls.iter().find(|(a, _)| a[0] == "faux_farm_begin").unwrap();
        assert_eq!(begin.0[2], "all");
        assert_eq!(begin.0[4], "medium");
    }

    #[test]
    fn test_failed_farm_stage_stops_bake() {
        let runner = RecordingRunner {
            fail: Some("faux_farm_pcast"),
            ..Default::default()
        };
        let err = Lightmapper::new(&runner, &settings(Target::Reach), "levels\\crate", "crate", false)
            .with_project_root("/project")
            .run()
            .unwrap_err();
        match err {
            ForgeError::LightmapFailed { stage, log } => {
                assert_eq!(stage, "pcast");
                assert!(log.starts_with("/project/faux/111/logs/pcast"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(!runner.verbs().contains(&"faux_farm_radest_extillum".to_string()));
    }

    #[test]
    fn test_corinth_single_bsp_with_settings() {
        let runner = RecordingRunner::default();
        let mut settings = settings(Target::Corinth);
        settings.lightmap.corinth_quality = "high".into();
        settings.lightmap.all_bsps = false;
        settings.lightmap.specific_bsp = "010".into();
        Lightmapper::new(&runner, &settings, "levels\\crate", "crate", false)
            .run()
            .unwrap();
        let calls = runner.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            vec![
                "faux_lightmap_with_settings",
                "levels\\crate",
                "crate_010",
                "true",
                "false",
                "globals\\lightmapper_settings\\high",
            ]
        );
    }

    #[test]
    fn test_corinth_model_lightmap() {
        let runner = RecordingRunner::default();
        Lightmapper::new(&runner, &settings(Target::Corinth), "objects\\crate", "crate", true)
            .run()
            .unwrap();
        assert_eq!(runner.verbs(), vec!["faux_lightmap_model"]);
    }
}
