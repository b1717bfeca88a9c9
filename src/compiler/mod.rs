//! Tag compiler and lightmapper invocation
//!
//! This module provides:
//! - The `ToolRunner` seam over blocking tool processes
//! - Manifest import with stderr classification into `error.log`
//! - The phased lightmap bake

mod invoker;
mod lightmap;
mod tool;

pub use invoker::{
    explain_failure, import_flags, process_stderr, CompileOutcome, LineKind, StderrClassifier, StderrSummary,
    TagCompiler, ERROR_LOG,
};
pub use lightmap::{LightmapPhase, Lightmapper};
pub use tool::{ProcessRunner, ToolRunner};
