//! Bounded conversion pool with a validation and retry pass.
//!
//! Submission blocks while `2 × workers` tasks are in flight. Once every
//! task has been dispatched and the pool is idle, each compiled container is
//! checked on disk; a missing or empty one is re-run synchronously, then once
//! more after a delay, and a third failure aborts the export.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::unbounded;
use log::{debug, info, warn};
use parking_lot::{Condvar, Mutex};

use super::cancel::CancellationToken;
use super::converter::{ConversionTask, Converter};
use super::patch::patch_container;
use crate::config::ExportSettings;
use crate::error::{ForgeError, Result};

/// Conversions a single task may take before the export fails.
pub const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    pub workers: usize,
    /// Convert every task on the calling thread.
    pub synchronous: bool,
    pub retry_delay: Duration,
    /// Apply the legacy header patch to every validated container.
    pub patch_legacy: bool,
}

impl PoolConfig {
    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self {
            workers: settings.worker_count(),
            synchronous: settings.slow_conversion,
            retry_delay: settings.retry_delay(),
            patch_legacy: !settings.is_corinth(),
        }
    }

    /// Most tasks allowed in flight at once.
    pub fn capacity(&self) -> usize {
        self.workers.max(1) * 2
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionReport {
    pub converted: usize,
    /// Tasks that needed at least one synchronous retry.
    pub retried: usize,
    pub peak_in_flight: usize,
}

/// Counter of submitted but unfinished tasks.
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    peak: AtomicUsize,
    lock: Mutex<()>,
    changed: Condvar,
}

impl InFlight {
    fn acquire(&self, capacity: usize) {
        let mut guard = self.lock.lock();
        while self.count.load(Ordering::SeqCst) >= capacity {
            self.changed.wait(&mut guard);
        }
        let now = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn release(&self) {
        let _guard = self.lock.lock();
        self.count.fetch_sub(1, Ordering::SeqCst);
        self.changed.notify_all();
    }

    fn wait_idle(&self) {
        let mut guard = self.lock.lock();
        while self.count.load(Ordering::SeqCst) > 0 {
            self.changed.wait(&mut guard);
        }
    }
}

pub struct ConversionPool {
    converter: Arc<dyn Converter>,
    data_dir: PathBuf,
    config: PoolConfig,
    cancel: CancellationToken,
}

impl ConversionPool {
    pub fn new(
        converter: Arc<dyn Converter>,
        data_dir: impl Into<PathBuf>,
        config: PoolConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            converter,
            data_dir: data_dir.into(),
            config,
            cancel,
        }
    }

    /// Convert every task, validate the results and patch legacy containers.
    pub fn run(&self, mut tasks: Vec<ConversionTask>) -> Result<ConversionReport> {
        let mut report = ConversionReport::default();
        if tasks.is_empty() {
            return Ok(report);
        }
        self.remove_stale(&tasks)?;

        if self.config.synchronous {
            for task in tasks.iter_mut() {
                if self.cancel.is_cancelled() {
                    return Err(ForgeError::Cancelled);
                }
                task.attempt += 1;
                self.convert_logged(task, false);
            }
            report.peak_in_flight = 1;
        } else {
            report.peak_in_flight = self.dispatch(&mut tasks);
        }
        if self.cancel.is_cancelled() {
            return Err(ForgeError::Cancelled);
        }

        info!("Validating {} compiled files", tasks.len());
        for task in tasks.iter_mut() {
            if self.validate(task)? {
                report.retried += 1;
            }
            if self.config.patch_legacy {
                patch_container(&self.data_dir.join(&task.paths.compiled))?;
            }
            report.converted += 1;
        }
        Ok(report)
    }

    /// Delete old outputs so a container on disk always means success.
    fn remove_stale(&self, tasks: &[ConversionTask]) -> Result<()> {
        for task in tasks {
            let compiled = self.data_dir.join(&task.paths.compiled);
            if compiled.exists() {
                std::fs::remove_file(&compiled)?;
            }
            if let Some(parent) = compiled.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    /// Feed tasks to the workers, returning the peak in-flight count.
    fn dispatch(&self, tasks: &mut [ConversionTask]) -> usize {
        let in_flight = InFlight::default();
        let capacity = self.config.capacity();
        let workers = self.config.workers.max(1).min(tasks.len());
        let (sender, receiver) = unbounded::<ConversionTask>();

        thread::scope(|scope| {
            for id in 0..workers {
                let receiver = receiver.clone();
                let in_flight = &in_flight;
                let converter = &self.converter;
                scope.spawn(move || {
                    for task in receiver.iter() {
                        debug!("Worker {} converting {}", id, task.paths.compiled.display());
                        if let Err(e) = converter.convert(&task, false) {
                            warn!("{}: {}", task.paths.compiled.display(), e);
                        }
                        in_flight.release();
                    }
                });
            }
            drop(receiver);

            for task in tasks.iter_mut() {
                if self.cancel.is_cancelled() {
                    warn!("Cancellation requested, no further conversions will be started");
                    break;
                }
                in_flight.acquire(capacity);
                task.attempt += 1;
                if sender.send(task.clone()).is_err() {
                    in_flight.release();
                    break;
                }
            }
            drop(sender);
            in_flight.wait_idle();
        });

        in_flight.peak.load(Ordering::SeqCst)
    }

    /// Convert on the calling thread. A converter error counts as a failed
    /// attempt, left for validation to retry.
    fn convert_logged(&self, task: &ConversionTask, verbose: bool) {
        if let Err(e) = self.converter.convert(task, verbose) {
            warn!("{}: {}", task.paths.compiled.display(), e);
        }
    }

    /// Re-run a failed task synchronously. Returns whether a retry was needed.
    fn validate(&self, task: &mut ConversionTask) -> Result<bool> {
        if task.is_complete(&self.data_dir) {
            return Ok(false);
        }
        while task.attempt < MAX_ATTEMPTS {
            let last = task.attempt + 1 == MAX_ATTEMPTS;
            if last {
                warn!("Failed to build GR2 file: {}. Retrying...", task.paths.compiled.display());
            }
            task.attempt += 1;
            self.convert_logged(task, last);
            if last {
                thread::sleep(self.config.retry_delay);
            }
            if task.is_complete(&self.data_dir) {
                return Ok(true);
            }
        }
        Err(ForgeError::ConversionFailed {
            path: task.paths.compiled.clone(),
            attempts: task.attempt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{model_paths, JobRole};
    use std::path::Path;
    use tempfile::tempdir;

    /// Writes a patchable container after a short pause; fails the first
    /// `failures` calls for each task.
    struct FakeConverter {
        data_dir: PathBuf,
        failures: u32,
        /// Report failed attempts as errors instead of writing nothing.
        errors: bool,
        calls: AtomicUsize,
        running: AtomicUsize,
        peak_running: AtomicUsize,
    }

    impl FakeConverter {
        fn new(data_dir: &Path, failures: u32) -> Self {
            Self {
                data_dir: data_dir.to_path_buf(),
                failures,
                errors: false,
                calls: AtomicUsize::new(0),
                running: AtomicUsize::new(0),
                peak_running: AtomicUsize::new(0),
            }
        }
    }

    impl Converter for FakeConverter {
        fn name(&self) -> &str {
            "fake"
        }

        fn convert(&self, task: &ConversionTask, _verbose: bool) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_running.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.running.fetch_sub(1, Ordering::SeqCst);
            if task.attempt > self.failures {
                std::fs::write(self.data_dir.join(&task.paths.compiled), vec![0u8; 0x100])?;
            } else if self.errors {
                return Err(ForgeError::ToolLaunch {
                    tool: "fake".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "crashed"),
                });
            }
            Ok(())
        }
    }

    fn tasks(count: usize) -> Vec<ConversionTask> {
        (0..count)
            .map(|i| {
                ConversionTask::new(model_paths(
                    Path::new("objects/crate"),
                    "crate",
                    JobRole::Render,
                    &format!("perm{}", i),
                    None,
                ))
            })
            .collect()
    }

    fn config(workers: usize) -> PoolConfig {
        PoolConfig {
            workers,
            synchronous: false,
            retry_delay: Duration::ZERO,
            patch_legacy: true,
        }
    }

    #[test]
    fn test_backpressure_caps_in_flight() {
        let temp = tempdir().unwrap();
        let converter = Arc::new(FakeConverter::new(temp.path(), 0));
        let pool = ConversionPool::new(converter.clone(), temp.path(), config(4), CancellationToken::new());

        let work = tasks(10);
        let report = pool.run(work.clone()).unwrap();
        assert_eq!(report.converted, 10);
        assert!(report.peak_in_flight <= 8);
        assert!(converter.peak_running.load(Ordering::SeqCst) <= 4);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 10);
        for task in &work {
            let data = std::fs::read(temp.path().join(&task.paths.compiled)).unwrap();
            assert_eq!(data[0x94], b'H');
        }
    }

    #[test]
    fn test_flaky_conversion_is_retried() {
        let temp = tempdir().unwrap();
        let converter = Arc::new(FakeConverter::new(temp.path(), 1));
        let pool = ConversionPool::new(converter.clone(), temp.path(), config(2), CancellationToken::new());

        let report = pool.run(tasks(3)).unwrap();
        assert_eq!(report.retried, 3);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_retry_bound() {
        let temp = tempdir().unwrap();
        let converter = Arc::new(FakeConverter::new(temp.path(), u32::MAX));
        let pool = ConversionPool::new(converter.clone(), temp.path(), config(1), CancellationToken::new());

        let err = pool.run(tasks(1)).unwrap_err();
        assert!(matches!(err, ForgeError::ConversionFailed { attempts: 3, .. }));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_stale_output_is_removed() {
        let temp = tempdir().unwrap();
        let work = tasks(1);
        let compiled = temp.path().join(&work[0].paths.compiled);
        std::fs::create_dir_all(compiled.parent().unwrap()).unwrap();
        std::fs::write(&compiled, b"stale").unwrap();

        let converter = Arc::new(FakeConverter::new(temp.path(), u32::MAX));
        let pool = ConversionPool::new(converter, temp.path(), config(1), CancellationToken::new());
        assert!(pool.run(work).is_err());
        assert!(!compiled.exists());
    }

    #[test]
    fn test_synchronous_mode() {
        let temp = tempdir().unwrap();
        let converter = Arc::new(FakeConverter::new(temp.path(), 0));
        let mut cfg = config(4);
        cfg.synchronous = true;
        cfg.patch_legacy = false;
        let pool = ConversionPool::new(converter.clone(), temp.path(), cfg, CancellationToken::new());

        let report = pool.run(tasks(5)).unwrap();
        assert_eq!(report.converted, 5);
        assert_eq!(converter.peak_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancelled_before_dispatch() {
        let temp = tempdir().unwrap();
        let converter = Arc::new(FakeConverter::new(temp.path(), 0));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let pool = ConversionPool::new(converter.clone(), temp.path(), config(2), cancel);

        assert!(matches!(pool.run(tasks(4)), Err(ForgeError::Cancelled)));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_synchronous_errors_are_retried() {
        let temp = tempdir().unwrap();
        let mut converter = FakeConverter::new(temp.path(), 1);
        converter.errors = true;
        let converter = Arc::new(converter);
        let mut cfg = config(2);
        cfg.synchronous = true;
        let pool = ConversionPool::new(converter.clone(), temp.path(), cfg, CancellationToken::new());

        let report = pool.run(tasks(3)).unwrap();
        assert_eq!(report.converted, 3);
        assert_eq!(report.retried, 3);
        assert_eq!(converter.calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_erroring_converter_hits_retry_bound() {
        for synchronous in [false, true] {
            let temp = tempdir().unwrap();
            let mut converter = FakeConverter::new(temp.path(), u32::MAX);
            converter.errors = true;
            let converter = Arc::new(converter);
            let mut cfg = config(1);
            cfg.synchronous = synchronous;
            let pool = ConversionPool::new(converter.clone(), temp.path(), cfg, CancellationToken::new());

            let err = pool.run(tasks(1)).unwrap_err();
            assert!(matches!(err, ForgeError::ConversionFailed { attempts: 3, .. }));
            assert_eq!(converter.calls.load(Ordering::SeqCst), 3);
        }
    }
}
