//! Native conversion
//!
//! Runs the external converter over every dispatched job with bounded
//! concurrency, validates the compiled containers and patches legacy ones.

pub mod cancel;
pub mod converter;
pub mod patch;
pub mod pool;

pub use cancel::{clear_incomplete, export_dir, mark_incomplete, CancellationToken, INCOMPLETE_MARKER};
pub use converter::{ConversionTask, Converter, ToolConverter};
pub use patch::patch_container;
pub use pool::{ConversionPool, ConversionReport, PoolConfig, MAX_ATTEMPTS};
