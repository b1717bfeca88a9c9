//! Tag compiler import of a build manifest.
//!
//! The compiler's stderr is streamed line by line: each line is classified,
//! logged and copied into `error.log` next to the asset. The first assertion
//! marks the import failed and everything after it is treated as an error.
//! A corrupt container aborts the import on the spot.

use std::fs::{self, File};
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use super::tool::ToolRunner;
use crate::config::ExportSettings;
use crate::error::{ForgeError, Result};

pub const ERROR_LOG: &str = "error.log";

const INVALID_CONTAINER: &str = "importing an invalid granny file,";
const ASSERTION: &str = "ASSERTION FAILED";
const ANIMATION_PREFIX: &str = "animation:import: ";

/// Import arguments after `import <manifest>`.
pub fn import_flags(settings: &ExportSettings, asset: &str) -> Vec<String> {
    let flags = &settings.import;
    let mut args: Vec<&str> = Vec::new();
    if flags.force {
        args.push("force");
    }
    if flags.skip_instances {
        args.push("skip_instances");
    }
    if settings.is_corinth() {
        args.push("preserve_namespaces");
        for (set, flag) in [
            (flags.lighting, "lighting"),
            (flags.meta_only, "meta_only"),
            (flags.disable_hulls, "disable_hulls"),
            (flags.disable_collision, "no_collision"),
            (flags.no_pca, "no_pca"),
            (flags.force_animations, "force_errors"),
        ] {
            if set {
                args.push(flag);
            }
        }
    } else {
        for (set, flag) in [
            (flags.draft, "draft"),
            (flags.seam_debug, "seam_debug"),
            (flags.decompose_instances, "decompose_instances"),
            (flags.suppress_errors, "suppress_errors_to_vrml"),
        ] {
            if set {
                args.push(flag);
            }
        }
    }
    let mut args: Vec<String> = args.into_iter().map(String::from).collect();
    args.extend(settings.selected_bsps.iter().map(|bsp| format!("{}_{}", asset, bsp)));
    args
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Marks the import failed.
    Fatal,
    Error,
    Warning,
    Info,
    /// Known noise, neither shown nor logged.
    Skipped,
}

/// Stateful stderr line classifier.
#[derive(Debug, Default)]
pub struct StderrClassifier {
    failed: bool,
}

impl StderrClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn classify(&mut self, line: &str) -> Result<LineKind> {
        if self.failed {
            return Ok(LineKind::Fatal);
        }
        if line.trim().is_empty() {
            return Ok(LineKind::Skipped);
        }
        if line.starts_with(INVALID_CONTAINER) {
            return Err(ForgeError::ImportAborted { line: line.to_string() });
        }
        if line.contains(ASSERTION) {
            self.failed = true;
            return Ok(LineKind::Fatal);
        }
        if line.contains("(skipping tangent-space calculations)")
            || line.contains("if it is a decorator")
            || line.contains("Uncompressed vertices are not supported for meshes with type")
            || (line.contains("Failed to find any animated nodes") && line.contains("idle"))
        {
            return Ok(LineKind::Skipped);
        }
        if let Some((_, message)) = line.split_once(ANIMATION_PREFIX) {
            return Ok(if message.starts_with("Failed to extract") {
                LineKind::Warning
            } else if message.starts_with("Failed") {
                LineKind::Error
            } else {
                LineKind::Info
            });
        }
        Ok(LineKind::Warning)
    }
}

/// What a stderr stream contained.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StderrSummary {
    pub failed: bool,
    pub errors: usize,
    pub warnings: usize,
}

/// Classify and log every line of `reader`, copying kept lines to `log`.
pub fn process_stderr<R: BufRead, W: Write>(reader: R, log: &mut W) -> Result<StderrSummary> {
    let mut classifier = StderrClassifier::new();
    let mut summary = StderrSummary::default();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        match classifier.classify(line) {
            Ok(LineKind::Skipped) => continue,
            Ok(LineKind::Fatal) | Ok(LineKind::Error) => {
                error!("{}", line);
                summary.errors += 1;
            }
            Ok(LineKind::Warning) => {
                warn!("{}", line);
                summary.warnings += 1;
            }
            Ok(LineKind::Info) => info!("{}", line),
            Err(e) => {
                writeln!(log, "{}", line)?;
                error!("Corrupt GR2 File encountered. Please re-run export");
                return Err(e);
            }
        }
        writeln!(log, "{}", line)?;
    }
    summary.failed = classifier.failed();
    Ok(summary)
}

/// Explanation for a failure the compiler is known to report cryptically.
pub fn explain_failure(log: &str) -> Option<String> {
    for line in log.lines() {
        if line.contains("point->node_indices[0]==section->node_index") {
            return Some(
                "A collision mesh had vertex weights that were not equal to 1 or 0. Collision objects must use rigid vertex weighting or be bone parented".to_string(),
            );
        }
        if line.contains("does not have the required 'BungieExportInfo' model") {
            return Some("Tool built a corrupt GR2 during export. Please try exporting again".to_string());
        }
        if line.contains("non-world space mesh has no valid bones") {
            let object = line.rsplit("mesh=").next().unwrap_or_default().trim();
            return Some(format!(
                "Object \"{}\" is parented to the armature but has no bone weighting. Bone parent it or weight every vertex to a bone",
                object
            ));
        }
    }
    None
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompileOutcome {
    Success,
    /// Tags were produced but the compiler emitted warnings.
    Partial { warnings: usize },
    /// No usable tags were produced.
    Failed { reason: String },
}

impl CompileOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Outcome for a finished import. The log at `log_path` is removed
    /// unless the import failed.
    pub fn resolve(summary: &StderrSummary, exit_ok: bool, log_path: &Path) -> Result<Self> {
        if summary.failed || !exit_ok {
            let log = fs::read_to_string(log_path).unwrap_or_default();
            let reason = explain_failure(&log).unwrap_or_else(|| {
                if summary.failed {
                    format!("Tag compiler reported errors, see {}", log_path.display())
                } else {
                    format!("Tag compiler exited with an error, see {}", log_path.display())
                }
            });
            return Ok(Self::Failed { reason });
        }
        if log_path.exists() {
            fs::remove_file(log_path)?;
        }
        Ok(if summary.warnings > 0 {
            Self::Partial {
                warnings: summary.warnings,
            }
        } else {
            Self::Success
        })
    }
}

/// Runs `tool import` against a manifest.
pub struct TagCompiler<'a> {
    runner: &'a dyn ToolRunner,
}

impl<'a> TagCompiler<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Self { runner }
    }

    /// Import `manifest` (data relative, `\` separated). `asset_dir` is the
    /// absolute asset directory receiving `error.log`.
    pub fn import(&self, manifest: &str, flags: &[String], asset_dir: &Path) -> Result<CompileOutcome> {
        let log_path: PathBuf = asset_dir.join(ERROR_LOG);
        fs::create_dir_all(asset_dir)?;
        info!("Importing {}", manifest);

        let mut args = vec!["import".to_string(), manifest.to_string()];
        args.extend(flags.iter().cloned());

        let mut log = BufWriter::new(File::create(&log_path)?);
        let mut summary = StderrSummary::default();
        let exit_ok = self.runner.run_piped(&args, &mut |reader| {
            summary = process_stderr(reader, &mut log)?;
            Ok(())
        })?;
        log.flush()?;
        drop(log);

        CompileOutcome::resolve(&summary, exit_ok, &log_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Target;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use tempfile::tempdir;
    use test_case::test_case;

    /// Replays canned stderr for every piped invocation.
    struct ScriptedRunner {
        stderr: &'static str,
        exit_ok: bool,
        args: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        fn new(stderr: &'static str, exit_ok: bool) -> Self {
            Self {
                stderr,
                exit_ok,
                args: Mutex::new(Vec::new()),
            }
        }
    }

    impl ToolRunner for ScriptedRunner {
        fn run(&self, args: &[String], _log: Option<&Path>) -> Result<bool> {
            *self.args.lock() = args.to_vec();
            Ok(self.exit_ok)
        }

        fn run_piped(&self, args: &[String], stderr: &mut dyn FnMut(&mut dyn BufRead) -> Result<()>) -> Result<bool> {
            *self.args.lock() = args.to_vec();
            stderr(&mut Cursor::new(self.stderr.as_bytes()))?;
            Ok(self.exit_ok)
        }
    }

    #[test]
    fn test_legacy_import_flags() {
        let mut settings = ExportSettings::default();
        settings.import.force = true;
        settings.import.draft = true;
        settings.import.lighting = true;
        settings.selected_bsps = vec!["010".into(), "020".into()];
        assert_eq!(
            import_flags(&settings, "crate"),
            vec!["force", "draft", "crate_010", "crate_020"]
        );
    }

    #[test]
    fn test_corinth_import_flags() {
        let mut settings = ExportSettings {
            target: Target::Corinth,
            ..Default::default()
        };
        settings.import.disable_collision = true;
        settings.import.force_animations = true;
        settings.import.draft = true;
        assert_eq!(
            import_flags(&settings, "crate"),
            vec!["preserve_namespaces", "no_collision", "force_errors"]
        );
    }

    #[test_case("WARNING: material missing", LineKind::Warning)]
    #[test_case("mesh foo (skipping tangent-space calculations)", LineKind::Skipped)]
    #[test_case("Uncompressed vertices are not supported for meshes with type default", LineKind::Skipped)]
    #[test_case("animation:import: Failed to extract frames", LineKind::Warning)]
    #[test_case("animation:import: Failed to import idle", LineKind::Error)]
    #[test_case("animation:import: imported 40 frames", LineKind::Info)]
    #[test_case("EXCEPTION: ASSERTION FAILED in render_model", LineKind::Fatal)]
    fn test_line_classification(line: &str, expected: LineKind) {
        let mut classifier = StderrClassifier::new();
        assert_eq!(classifier.classify(line).unwrap(), expected);
    }

    #[test]
    fn test_lines_after_assertion_are_fatal() {
        let mut classifier = StderrClassifier::new();
        classifier.classify("ASSERTION FAILED").unwrap();
        assert_eq!(classifier.classify("just a warning").unwrap(), LineKind::Fatal);
        assert!(classifier.failed());
    }

    #[test]
    fn test_invalid_container_aborts() {
        let stderr = "first warning\nimporting an invalid granny file, crate_render.gr2\nnever read\n";
        let mut log = Vec::new();
        let err = process_stderr(Cursor::new(stderr), &mut log).unwrap_err();
        assert!(matches!(err, ForgeError::ImportAborted { .. }));
        assert_eq!(
            String::from_utf8(log).unwrap(),
            "first warning\nimporting an invalid granny file, crate_render.gr2\n"
        );
    }

    #[test]
    fn test_skipped_lines_are_not_logged() {
        let stderr = "a (skipping tangent-space calculations)\nreal warning\n";
        let mut log = Vec::new();
        let summary = process_stderr(Cursor::new(stderr), &mut log).unwrap();
        assert_eq!(summary.warnings, 1);
        assert!(!summary.failed);
        assert_eq!(String::from_utf8(log).unwrap(), "real warning\n");
    }

    #[test]
    fn test_known_failure_is_explained() {
        let log = "ASSERTION FAILED\nnon-world space mesh has no valid bones mesh=door_frame\n";
        let explanation = explain_failure(log).unwrap();
        assert!(explanation.contains("\"door_frame\""));
        assert_eq!(explain_failure("something else"), None);
    }

    #[test]
    fn test_outcome_removes_log_on_success() {
        let temp = tempdir().unwrap();
        let log = temp.path().join(ERROR_LOG);
        fs::write(&log, "a warning\n").unwrap();
        let summary = StderrSummary {
            failed: false,
            errors: 0,
            warnings: 1,
        };
        let outcome = CompileOutcome::resolve(&summary, true, &log).unwrap();
        assert_eq!(outcome, CompileOutcome::Partial { warnings: 1 });
        assert!(!log.exists());
    }

    #[test]
    fn test_outcome_keeps_log_on_failure() {
        let temp = tempdir().unwrap();
        let log = temp.path().join(ERROR_LOG);
        fs::write(&log, "does not have the required 'BungieExportInfo' model\n").unwrap();
        let summary = StderrSummary {
            failed: true,
            errors: 1,
            warnings: 0,
        };
        let outcome = CompileOutcome::resolve(&summary, true, &log).unwrap();
        assert!(outcome.is_failure());
        assert!(log.exists());

        let clean = StderrSummary::default();
        let outcome = CompileOutcome::resolve(&clean, false, &log).unwrap();
        assert!(matches!(outcome, CompileOutcome::Failed { .. }));
    }

    #[test]
    fn test_import_passes_manifest_and_flags() {
        let temp = tempdir().unwrap();
        let runner = ScriptedRunner::new("", true);
        let flags = vec!["force".to_string()];
        let outcome = TagCompiler::new(&runner)
            .import("objects\\crate\\crate.sidecar.xml", &flags, temp.path())
            .unwrap();
        assert_eq!(outcome, CompileOutcome::Success);
        assert_eq!(
            *runner.args.lock(),
            vec!["import", "objects\\crate\\crate.sidecar.xml", "force"]
        );
        assert!(!temp.path().join(ERROR_LOG).exists());
    }

    #[test]
    fn test_import_assertion_fails_and_keeps_log() {
        let temp = tempdir().unwrap();
        let runner = ScriptedRunner::new("WARNING: slow\nASSERTION FAILED in collision\n", true);
        let outcome = TagCompiler::new(&runner).import("crate.sidecar.xml", &[], temp.path()).unwrap();
        assert!(outcome.is_failure());
        let log = fs::read_to_string(temp.path().join(ERROR_LOG)).unwrap();
        assert_eq!(log, "WARNING: slow\nASSERTION FAILED in collision\n");
    }

    #[test]
    fn test_import_abort_propagates() {
        let temp = tempdir().unwrap();
        let runner = ScriptedRunner::new("importing an invalid granny file, a.gr2\n", true);
        let err = TagCompiler::new(&runner).import("crate.sidecar.xml", &[], temp.path()).unwrap_err();
        assert!(matches!(err, ForgeError::ImportAborted { .. }));
    }
}
