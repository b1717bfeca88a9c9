//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::config::ExportSettings;
use crate::pipeline::{ExportOutcome, Exporter};
use crate::scene::SceneSnapshot;

/// Options for the export command that override the settings file.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub pool_size: Option<usize>,
    pub slow: bool,
    pub no_tags: bool,
    pub permutations: Vec<String>,
    pub bsps: Vec<String>,
}

impl ExportOptions {
    fn apply(&self, settings: &mut ExportSettings) {
        if let Some(size) = self.pool_size.filter(|&n| n > 0) {
            settings.pool_size = Some(size);
        }
        settings.slow_conversion |= self.slow;
        if self.no_tags {
            settings.build_tags = false;
        }
        if !self.permutations.is_empty() {
            settings.selected_permutations = self.permutations.clone();
        }
        if !self.bsps.is_empty() {
            settings.selected_bsps = self.bsps.clone();
        }
    }
}

/// Settings from `path`, or defaults plus environment overrides.
pub fn load_settings(path: Option<&Path>) -> Result<ExportSettings> {
    match path {
        Some(path) => ExportSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(ExportSettings::from_env()),
    }
}

fn load_scene(path: &Path) -> Result<SceneSnapshot> {
    SceneSnapshot::load(path).with_context(|| format!("Failed to load scene {}", path.display()))
}

/// Run a full export. Returns whether it succeeded.
pub fn export(exporter: Exporter, scene: &Path) -> Result<bool> {
    let snapshot = load_scene(scene)?;
    info!("Exporting {} ({})", snapshot.asset.name, snapshot.asset.category);

    let (summary, report) = exporter.export(snapshot);
    if report.warnings > 0 {
        warn!("{} scene warnings, see log above", report.warnings);
    }
    if let Some(manifest) = &report.manifest {
        println!("Manifest: {}", manifest.display());
    }
    if let Some(lightmap) = &report.lightmap {
        println!("{}", lightmap);
    }
    println!("{}", summary);
    if let ExportOutcome::CompilerFailure(_) = summary.outcome {
        println!("Intermediate files were kept for diagnosis");
    }
    Ok(summary.is_success())
}

/// Exporter for `settings` with the command line overrides applied.
pub fn exporter(mut settings: ExportSettings, options: &ExportOptions) -> Exporter {
    options.apply(&mut settings);
    Exporter::new(settings)
}

/// Print the job plan.
pub fn plan(settings: ExportSettings, scene: &Path, json: bool) -> Result<()> {
    let exporter = Exporter::new(settings);
    let (_, plan) = exporter.plan(load_scene(scene)?)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }
    println!("{} jobs ({} dispatched)", plan.len(), plan.dispatched().count());
    for job in plan.iter() {
        println!(
            "  {:<24} {:>4} objects  {}{}",
            job.label(),
            job.objects.len(),
            job.paths.compiled.display(),
            if job.dispatch { "" } else { "  (skipped)" }
        );
    }
    Ok(())
}

/// Print or write the build manifest.
pub fn manifest(settings: ExportSettings, scene: &Path, write: bool) -> Result<()> {
    let exporter = Exporter::new(settings);
    let (normalized, plan) = exporter.plan(load_scene(scene)?)?;
    let manifest = exporter.manifest(&normalized, &plan);
    if write {
        let path = manifest.write(&exporter.settings().project.data_dir)?;
        println!("Manifest written: {}", path.display());
    } else {
        print!("{}", manifest.to_xml());
    }
    Ok(())
}

/// Bake lighting without exporting.
pub fn lightmap(settings: ExportSettings, scene: &Path) -> Result<()> {
    let mut settings = settings;
    settings.lightmap.enabled = true;
    let exporter = Exporter::new(settings);
    let (normalized, _) = exporter.plan(load_scene(scene)?)?;
    match exporter.lightmap(&normalized)? {
        Some(message) => println!("{}", message),
        None => println!(
            "{} assets cannot be lightmapped for this target",
            normalized.category()
        ),
    }
    Ok(())
}

/// Normalize a scene and report what the export would see.
pub fn validate(settings: ExportSettings, scene: &Path) -> Result<()> {
    let exporter = Exporter::new(settings);
    let (normalized, plan) = exporter.plan(load_scene(scene)?)?;
    println!("Asset: {} ({})", normalized.asset.name, normalized.category());
    println!("Objects: {}", normalized.objects.len());
    println!("Skeleton root: {}", normalized.skeleton.root);
    println!("Jobs: {}", plan.len());
    if normalized.warnings.is_empty() {
        println!("No warnings");
    } else {
        println!("Warnings:");
        for warning in &normalized.warnings {
            println!("  {}", warning);
        }
    }
    Ok(())
}
