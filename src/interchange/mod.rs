//! Interchange writer
//!
//! Each dispatched job gets a binary interchange file holding its geometry
//! and skeleton, plus a JSON metadata file holding the export properties the
//! converter stamps onto the compiled container.

pub mod mesh_file;
pub mod metadata;

use std::path::Path;

use log::debug;

use crate::error::Result;
use crate::jobs::ExportJob;
use crate::normalize::NormalizedScene;

pub use mesh_file::{InterchangeFile, MAGIC, VERSION};
pub use metadata::JobMetadata;

/// Write the interchange and metadata files of `job` under `data_dir`.
pub fn write_job(scene: &NormalizedScene, job: &ExportJob, data_dir: &Path) -> Result<()> {
    let paths = job.paths.under(data_dir);
    InterchangeFile::build(scene, job).write(&paths.interchange)?;
    JobMetadata::build(scene, job).write(&paths.metadata)?;
    debug!("Wrote interchange files for {}", job.label());
    Ok(())
}
