//! The external interchange-to-container converter.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{ForgeError, Result};
use crate::jobs::JobPaths;

/// One conversion of an interchange pair into a compiled container.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionTask {
    /// Paths relative to the data directory.
    pub paths: JobPaths,
    pub attempt: u32,
}

impl ConversionTask {
    pub fn new(paths: JobPaths) -> Self {
        Self { paths, attempt: 0 }
    }

    /// Whether the compiled container exists and is non-empty.
    pub fn is_complete(&self, data_dir: &Path) -> bool {
        std::fs::metadata(data_dir.join(&self.paths.compiled))
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }
}

/// Anything that can turn an interchange pair into a compiled container.
///
/// Converters report only launch failures; whether the conversion worked is
/// judged by the compiled file on disk.
pub trait Converter: Send + Sync {
    fn name(&self) -> &str;

    /// Run one conversion. `verbose` shows the tool's output.
    fn convert(&self, task: &ConversionTask, verbose: bool) -> Result<()>;
}

/// Runs `tool fbx-to-gr2 <interchange> <metadata> <compiled>` from the
/// project root.
#[derive(Debug, Clone)]
pub struct ToolConverter {
    tool: PathBuf,
    project_root: PathBuf,
}

impl ToolConverter {
    pub fn new(tool: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            project_root: project_root.into(),
        }
    }

    pub fn args(task: &ConversionTask) -> Vec<String> {
        vec![
            "fbx-to-gr2".to_string(),
            task.paths.interchange.display().to_string(),
            task.paths.metadata.display().to_string(),
            task.paths.compiled.display().to_string(),
        ]
    }
}

impl Converter for ToolConverter {
    fn name(&self) -> &str {
        "fbx-to-gr2"
    }

    fn convert(&self, task: &ConversionTask, verbose: bool) -> Result<()> {
        let output = || if verbose { Stdio::inherit() } else { Stdio::null() };
        let status = Command::new(&self.tool)
            .args(Self::args(task))
            .current_dir(&self.project_root)
            .stdout(output())
            .stderr(output())
            .status()
            .map_err(|source| ForgeError::ToolLaunch {
                tool: self.tool.display().to_string(),
                source,
            })?;
        debug!(
            "{} exited with {} for {}",
            self.name(),
            status,
            task.paths.compiled.display()
        );
        Ok(())
    }
}
