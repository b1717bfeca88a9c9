//! The export pipeline
//!
//! One export runs the stages in order on the calling thread: normalize,
//! plan, write interchange files, convert, write the manifest, then import
//! and post-build tag work. Only conversion fans out to worker threads.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{error, info, warn};
use tracing::info_span;

use crate::compiler::{import_flags, CompileOutcome, Lightmapper, ProcessRunner, TagCompiler, ToolRunner};
use crate::config::ExportSettings;
use crate::convert::{
    clear_incomplete, export_dir, mark_incomplete, CancellationToken, ConversionPool, ConversionTask, Converter,
    PoolConfig, ToolConverter,
};
use crate::error::{ForgeError, Result};
use crate::interchange::write_job;
use crate::jobs::{JobFilter, JobPlan, JobPlanner};
use crate::manifest::{windows_path, BuildManifest, ManifestBuilder};
use crate::normalize::{NormalizedScene, Normalizer};
use crate::scene::{AssetCategory, SceneSnapshot};
use crate::tags::{cull_placeholder_scenery, post_build_requests, scenery_tag, submit_all, JsonTagApi, TagApi};

/// How an export ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Success,
    Cancelled,
    /// Interchange writing or conversion failed.
    JobFailure(String),
    /// The manifest was written but the tag compiler failed.
    CompilerFailure(String),
}

/// The single line reported at the end of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub outcome: ExportOutcome,
    pub elapsed: Duration,
}

impl ExportSummary {
    pub fn is_success(&self) -> bool {
        self.outcome == ExportOutcome::Success
    }
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.elapsed.as_secs_f64();
        match &self.outcome {
            ExportOutcome::Success => write!(f, "Export Complete ({:.1}s)", seconds),
            ExportOutcome::Cancelled => write!(f, "Export Cancelled ({:.1}s)", seconds),
            ExportOutcome::JobFailure(reason) => write!(f, "Export Failed: {} ({:.1}s)", reason, seconds),
            ExportOutcome::CompilerFailure(reason) => write!(f, "Tags Failed: {} ({:.1}s)", reason, seconds),
        }
    }
}

/// What a finished run produced, for callers that want more than the summary.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    pub jobs: usize,
    pub converted: usize,
    pub manifest: Option<PathBuf>,
    pub warnings: usize,
    pub lightmap: Option<String>,
}

/// Drives one asset export.
pub struct Exporter {
    settings: ExportSettings,
    converter: Arc<dyn Converter>,
    runner: Arc<dyn ToolRunner>,
    tag_api: Option<Arc<dyn TagApi>>,
    cancel: CancellationToken,
}

impl Exporter {
    /// An exporter backed by the project's tool executable.
    pub fn new(settings: ExportSettings) -> Self {
        let root = settings.project.project_root();
        let converter = Arc::new(ToolConverter::new(settings.project.tool.clone(), root.clone()));
        let runner = Arc::new(ProcessRunner::new(settings.project.tool.clone(), root));
        Self {
            settings,
            converter,
            runner,
            tag_api: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn with_tool_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_tag_api(mut self, api: Arc<dyn TagApi>) -> Self {
        self.tag_api = Some(api);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Normalize and plan without touching the disk.
    pub fn plan(&self, snapshot: SceneSnapshot) -> Result<(NormalizedScene, JobPlan)> {
        let scene = {
            let _span = info_span!("normalize", asset = %snapshot.asset.name).entered();
            Normalizer::new(self.settings.target).normalize(snapshot)?
        };
        let plan = {
            let _span = info_span!("plan").entered();
            JobPlanner::new(JobFilter::from_settings(&self.settings)).plan(&scene)?
        };
        Ok((scene, plan))
    }

    /// Build the manifest for a planned scene.
    pub fn manifest(&self, scene: &NormalizedScene, plan: &JobPlan) -> BuildManifest {
        ManifestBuilder::new(scene, plan, &self.settings).build()
    }

    /// Run a full export and summarise it.
    pub fn export(&self, snapshot: SceneSnapshot) -> (ExportSummary, ExportReport) {
        let start = Instant::now();
        let mut report = ExportReport::default();
        let data_dir = self.settings.project.data_dir.clone();
        let asset_dir = snapshot.asset.directory.clone();

        let outcome = match self.run(snapshot, &mut report) {
            Ok(outcome) => outcome,
            Err(ForgeError::Cancelled) => {
                if let Err(e) = mark_incomplete(&export_dir(&data_dir, &asset_dir)) {
                    warn!("{}", e);
                }
                ExportOutcome::Cancelled
            }
            Err(e @ (ForgeError::ImportAborted { .. } | ForgeError::LightmapFailed { .. })) => {
                error!("{}", e);
                ExportOutcome::CompilerFailure(e.to_string())
            }
            Err(e) => {
                error!("{}", e);
                for suggestion in e.recovery_suggestions() {
                    info!("  {}", suggestion);
                }
                ExportOutcome::JobFailure(e.to_string())
            }
        };
        let summary = ExportSummary {
            outcome,
            elapsed: start.elapsed(),
        };
        info!("{}", summary);
        (summary, report)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }
        Ok(())
    }

    fn run(&self, snapshot: SceneSnapshot, report: &mut ExportReport) -> Result<ExportOutcome> {
        let data_dir = self.settings.project.data_dir.clone();
        let (scene, plan) = self.plan(snapshot)?;
        report.jobs = plan.len();
        report.warnings = scene.warnings.len();
        self.check_cancelled()?;

        let exports = export_dir(&data_dir, &scene.asset.directory);
        clear_incomplete(&exports)?;

        {
            let _span = info_span!("interchange", jobs = plan.dispatched().count()).entered();
            for job in plan.dispatched() {
                self.check_cancelled()?;
                info!("Writing {}", job.label());
                write_job(&scene, job, &data_dir)?;
            }
        }

        {
            let tasks: Vec<ConversionTask> = plan
                .dispatched()
                .map(|job| ConversionTask::new(job.paths.clone()))
                .collect();
            let _span = info_span!("convert", tasks = tasks.len()).entered();
            let pool = ConversionPool::new(
                self.converter.clone(),
                data_dir.clone(),
                PoolConfig::from_settings(&self.settings),
                self.cancel.clone(),
            );
            let converted = pool.run(tasks)?;
            report.converted = converted.converted;
        }
        self.check_cancelled()?;

        let manifest = {
            let _span = info_span!("manifest").entered();
            let manifest = self.manifest(&scene, &plan);
            report.manifest = Some(manifest.write(&data_dir)?);
            manifest
        };

        if !self.settings.build_tags {
            return Ok(ExportOutcome::Success);
        }
        self.build_tags(&scene, &manifest, report)
    }

    fn build_tags(
        &self,
        scene: &NormalizedScene,
        manifest: &BuildManifest,
        report: &mut ExportReport,
    ) -> Result<ExportOutcome> {
        let _span = info_span!("import").entered();
        let project = &self.settings.project;
        let asset_dir = &scene.asset.directory;
        let scenery = scenery_tag(&project.tags_dir, asset_dir, &scene.asset.name);
        let scenery_existed = scenery.exists();

        let compiler = TagCompiler::new(self.runner.as_ref());
        let manifest_arg = windows_path(&project.data_dir.join(&manifest.path));
        let flags = import_flags(&self.settings, &scene.asset.name);
        match compiler.import(&manifest_arg, &flags, &project.data_dir.join(asset_dir))? {
            CompileOutcome::Failed { reason } => return Ok(ExportOutcome::CompilerFailure(reason)),
            CompileOutcome::Partial { warnings } => warn!("Tag import finished with {} warnings", warnings),
            CompileOutcome::Success => {}
        }

        if manifest.no_top_level_tag && !scenery_existed {
            cull_placeholder_scenery(&project.tags_dir, asset_dir, &scene.asset.name)?;
        }

        let requests = post_build_requests(scene, &self.settings);
        if !requests.is_empty() {
            let api: Arc<dyn TagApi> = match &self.tag_api {
                Some(api) => api.clone(),
                None => Arc::new(JsonTagApi::in_asset_dir(&project.data_dir.join(asset_dir))),
            };
            submit_all(api.as_ref(), &requests)?;
        }

        report.lightmap = self.lightmap(scene)?;
        Ok(ExportOutcome::Success)
    }

    /// Bake lighting when enabled and the asset supports it.
    pub fn lightmap(&self, scene: &NormalizedScene) -> Result<Option<String>> {
        let category = scene.category();
        let model = matches!(category, AssetCategory::Model | AssetCategory::Sky);
        let eligible = category == AssetCategory::Scenario || (scene.corinth && model);
        if !self.settings.lightmap.enabled || !eligible {
            return Ok(None);
        }
        let _span = info_span!("lightmap").entered();
        let scenario = windows_path(&scene.asset.directory.join(&scene.asset.name));
        let message = Lightmapper::new(self.runner.as_ref(), &self.settings, &scenario, &scene.asset.name, model)
            .run()?;
        info!("{}", message);
        Ok(Some(message))
    }
}
