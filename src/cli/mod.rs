//! CLI Module
//!
//! Command-line interface for the tagforge export pipeline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Tagforge - export scene snapshots to compiled game tags
#[derive(Parser, Debug)]
#[command(name = "tagforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Report stage timings through tracing spans
    #[arg(long, global = true)]
    pub trace: bool,

    /// Export settings file (JSON); defaults plus TAGFORGE_* variables when absent
    #[arg(short, long, global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a full export of a scene snapshot
    #[command(name = "export")]
    Export {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Conversion worker count
        #[arg(short, long)]
        pool_size: Option<usize>,

        /// Convert one job at a time
        #[arg(long)]
        slow: bool,

        /// Stop after writing the manifest
        #[arg(long)]
        no_tags: bool,

        /// Only convert these permutations
        #[arg(long = "permutation")]
        permutations: Vec<String>,

        /// Only convert and import these BSPs
        #[arg(long = "bsp")]
        bsps: Vec<String>,
    },

    /// Print the export jobs a scene would produce
    #[command(name = "plan")]
    Plan {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the build manifest a scene would produce
    #[command(name = "manifest")]
    Manifest {
        /// Scene snapshot (JSON)
        scene: PathBuf,

        /// Write the manifest under the data directory instead of printing it
        #[arg(short, long)]
        write: bool,
    },

    /// Bake lighting for an already imported asset
    #[command(name = "lightmap")]
    Lightmap {
        /// Scene snapshot (JSON)
        scene: PathBuf,
    },

    /// Load and normalize a scene, reporting warnings
    #[command(name = "validate")]
    Validate {
        /// Scene snapshot (JSON)
        scene: PathBuf,
    },
}
