//! Export job planning
//!
//! Turns a normalized scene into the ordered list of conversion jobs, each
//! owning one interchange file, one metadata file and one compiled container.

pub mod paths;
mod planner;

pub use paths::{animation_paths, model_paths, model_stem, JobPaths, JobRole};
pub use planner::{ExportJob, JobFilter, JobPlan, JobPlanner};
