// reportkeeper/src/cli.rs
//! This file defines the command-line interface (CLI) for the reportkeeper
//! application.

use clap::Parser;
use std::path::PathBuf;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "reportkeeper",
    author,
    version = env!("CARGO_PKG_VERSION"),
    about = "Automate crowd-sourced GIS reporting services",
    long_about = "ReportKeeper runs the configured automation passes against hosted feature services: assigning sequential identifiers to new reports, copying attributes from intersecting reference layers, screening free-text fields for prohibited words, and sending email notifications."
)]
pub struct Cli {
    /// Path to the services configuration file (searched for if omitted).
    #[arg(long, short = 'c', value_name = "FILE", env = "REPORTKEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Validate the configuration and exit without contacting any service.
    #[arg(long)]
    pub check: bool,

    /// Skip sending email notifications for this run.
    #[arg(long = "no-email")]
    pub no_email: bool,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Suppress all informational messages.
    #[arg(long, short = 'q')]
    pub quiet: bool,
}
