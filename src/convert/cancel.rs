//! Cancellation and untrusted-output tracking.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use walkdir::WalkDir;

use crate::error::Result;

/// Marker left in an export directory by an interrupted run.
pub const INCOMPLETE_MARKER: &str = ".incomplete";

/// Shared flag checked between task submissions.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// `{asset_dir}/export`, where compiled containers live.
pub fn export_dir(data_dir: &Path, asset_dir: &Path) -> PathBuf {
    data_dir.join(asset_dir).join("export")
}

/// Flag every compiled container under `export_dir` as untrusted.
pub fn mark_incomplete(export_dir: &Path) -> Result<()> {
    fs::create_dir_all(export_dir)?;
    fs::write(export_dir.join(INCOMPLETE_MARKER), b"")?;
    warn!("Export interrupted, compiled files in {} are untrusted", export_dir.display());
    Ok(())
}

/// If a previous run was interrupted, delete every compiled container it may
/// have left behind. Returns the number of files removed.
pub fn clear_incomplete(export_dir: &Path) -> Result<usize> {
    let marker = export_dir.join(INCOMPLETE_MARKER);
    if !marker.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in WalkDir::new(export_dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().map_or(false, |ext| ext == "gr2") {
            fs::remove_file(path)?;
            removed += 1;
        }
    }
    fs::remove_file(&marker)?;
    info!("Removed {} compiled files left by an interrupted export", removed);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_token_is_shared() {
        let token = CancellationToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_clear_without_marker_keeps_files() {
        let temp = tempdir().unwrap();
        let gr2 = temp.path().join("models/crate_render.gr2");
        fs::create_dir_all(gr2.parent().unwrap()).unwrap();
        fs::write(&gr2, b"data").unwrap();

        assert_eq!(clear_incomplete(temp.path()).unwrap(), 0);
        assert!(gr2.exists());
    }

    #[test]
    fn test_clear_after_interrupted_run() {
        let temp = tempdir().unwrap();
        let models = temp.path().join("models");
        let animations = temp.path().join("animations");
        fs::create_dir_all(&models).unwrap();
        fs::create_dir_all(&animations).unwrap();
        fs::write(models.join("crate_render.gr2"), b"data").unwrap();
        fs::write(animations.join("open.gr2"), b"data").unwrap();
        fs::write(models.join("notes.txt"), b"keep").unwrap();

        mark_incomplete(temp.path()).unwrap();
        assert_eq!(clear_incomplete(temp.path()).unwrap(), 2);
        assert!(models.join("notes.txt").exists());
        assert!(!temp.path().join(INCOMPLETE_MARKER).exists());
    }
}
