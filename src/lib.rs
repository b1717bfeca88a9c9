//! Tagforge - scene to tag export pipeline
//!
//! Tagforge turns an authored scene snapshot into compiled game tags:
//! 1. Normalization - classify objects, resolve names, skeleton and tables
//! 2. Partitioning - split meshes by face layer signature into uniform parts
//! 3. Job planning - one interchange/metadata/compiled triple per job
//! 4. Conversion - a bounded worker pool runs the external converter
//! 5. Manifest - the sidecar XML handed to the tag compiler
//!
//! # Architecture
//!
//! Each stage takes the previous stage's output by value or reference and
//! returns a new value; no stage mutates shared scene state.

pub mod cli;
pub mod compiler;
pub mod config;
pub mod convert;
pub mod error;
pub mod interchange;
pub mod jobs;
pub mod manifest;
pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod scene;
pub mod tags;

pub use config::{ExportSettings, Target};
pub use error::{ForgeError, Result, SceneWarning};
pub use pipeline::{ExportOutcome, ExportReport, ExportSummary, Exporter};
