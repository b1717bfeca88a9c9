//! Tagforge CLI - scene to tag export
//!
//! Command-line interface for the tagforge export pipeline.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use env_logger::Env;
use log::{info, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

use tagforge::cli::commands::{self, ExportOptions};
use tagforge::cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
            .with_span_events(FmtSpan::CLOSE)
            .init();
    } else {
        env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();
    }

    info!("Tagforge v{}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    let settings = commands::load_settings(cli.settings.as_deref())?;

    match cli.command {
        Some(Commands::Export {
            scene,
            pool_size,
            slow,
            no_tags,
            permutations,
            bsps,
        }) => {
            let options = ExportOptions {
                pool_size,
                slow,
                no_tags,
                permutations,
                bsps,
            };
            let exporter = commands::exporter(settings, &options);
            let cancel = exporter.cancellation_token();
            if let Err(e) = ctrlc::set_handler(move || {
                warn!("Cancelling export, waiting for running conversions to finish");
                cancel.cancel();
            }) {
                warn!("Could not install Ctrl-C handler: {}", e);
            }
            commands::export(exporter, &scene)
        }
        Some(Commands::Plan { scene, json }) => commands::plan(settings, &scene, json).map(|_| true),
        Some(Commands::Manifest { scene, write }) => commands::manifest(settings, &scene, write).map(|_| true),
        Some(Commands::Lightmap { scene }) => commands::lightmap(settings, &scene).map(|_| true),
        Some(Commands::Validate { scene }) => commands::validate(settings, &scene).map(|_| true),
        None => {
            println!("Tagforge v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(true)
        }
    }
}
