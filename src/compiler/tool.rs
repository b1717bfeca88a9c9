//! Blocking invocations of the editing kit tool.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{ForgeError, Result};

/// Runs one tool verb to completion.
pub trait ToolRunner: Send + Sync {
    /// Run `args`, sending all output to `log` when given. Returns whether
    /// the tool exited successfully.
    fn run(&self, args: &[String], log: Option<&Path>) -> Result<bool>;

    /// Run `args`, handing the tool's stderr to `stderr` while it runs. The
    /// tool is killed if `stderr` fails. Returns whether it exited successfully.
    fn run_piped(&self, args: &[String], stderr: &mut dyn FnMut(&mut dyn BufRead) -> Result<()>) -> Result<bool>;
}

/// Runs the real tool executable from the project root.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    pub tool: PathBuf,
    pub project_root: PathBuf,
}

impl ProcessRunner {
    pub fn new(tool: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            project_root: project_root.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.tool);
        command.current_dir(&self.project_root);
        command
    }

    fn launch_error(&self, source: io::Error) -> ForgeError {
        ForgeError::ToolLaunch {
            tool: self.tool.display().to_string(),
            source,
        }
    }
}

impl ToolRunner for ProcessRunner {
    fn run(&self, args: &[String], log: Option<&Path>) -> Result<bool> {
        debug!("tool {}", args.join(" "));
        let mut command = self.command();
        command.args(args);
        if let Some(log) = log {
            if let Some(parent) = log.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = File::create(log)?;
            command.stdout(Stdio::from(file.try_clone()?)).stderr(Stdio::from(file));
        }
        let status = command.status().map_err(|e| self.launch_error(e))?;
        Ok(status.success())
    }

    fn run_piped(&self, args: &[String], stderr: &mut dyn FnMut(&mut dyn BufRead) -> Result<()>) -> Result<bool> {
        debug!("tool {}", args.join(" "));
        let mut child = self
            .command()
            .args(args)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.launch_error(e))?;
        let pipe = child
            .stderr
            .take()
            .ok_or_else(|| self.launch_error(io::Error::new(io::ErrorKind::Other, "stderr not captured")))?;

        let mut reader = BufReader::new(pipe);
        if let Err(e) = stderr(&mut reader) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }
        Ok(child.wait()?.success())
    }
}
