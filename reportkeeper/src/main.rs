// reportkeeper/src/main.rs
//! ReportKeeper entry point.
//!
//! Loads the services configuration, connects to the portal and (optionally)
//! the SMTP server, runs the processing pipeline, prints the run summary, and
//! writes advanced sequence values back to the configuration file.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use reportkeeper::cli::Cli;
use reportkeeper::feature_service::{Portal, PortalOpener};
use reportkeeper::logger;
use reportkeeper::mailer::SmtpMailer;
use reportkeeper::report::print_summary;
use reportkeeper_core::mailer::Mailer;
use reportkeeper_core::{config_candidate_paths, Processor, ReportKeeperConfig};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    if args.quiet {
        logger::init_logger(Some(log::LevelFilter::Off));
    } else if args.debug {
        logger::init_logger(Some(log::LevelFilter::Debug));
    } else {
        logger::init_logger(None);
    }

    let config_path = resolve_config_path(args.config)?;
    let mut config = ReportKeeperConfig::load_from_file(&config_path)?;

    if args.check {
        println!("Configuration {} is valid.", config_path.display());
        return Ok(());
    }

    // Credentials may come from the environment instead of the file.
    if let Ok(password) = std::env::var("REPORTKEEPER_PORTAL_PASSWORD") {
        config.portal.password = password;
    }
    if let Ok(password) = std::env::var("REPORTKEEPER_SMTP_PASSWORD") {
        config.email.smtp_password = password;
    }

    let template_root = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let mut processor = Processor::new(&config, template_root)?;

    let portal = Portal::connect(
        &config.portal.url,
        &config.portal.username,
        &config.portal.password,
    )
    .with_context(|| {
        format!(
            "Could not connect to {}. Please verify paths and credentials.",
            config.portal.url
        )
    })?;
    let opener = PortalOpener::new(&portal);

    let mailer = if args.no_email || !config.email.configured() {
        None
    } else {
        Some(SmtpMailer::connect(&config.email).context("Failed to configure the SMTP mailer")?)
    };
    let mailer_ref: Option<&dyn Mailer> = mailer.as_ref().map(|m| m as &dyn Mailer);

    let summary = processor.run(&opener, mailer_ref);
    print_summary(&summary);

    // Issued identifiers are already on records, so the new sequence values
    // are persisted even when some record commits failed.
    if config.update_sequences(processor.sequence_snapshot()) {
        if let Err(e) = config.save_to_file(&config_path) {
            log::error!(
                "Failed to save identifier configuration values. {:#} New values: {:?}",
                e,
                config.sequences
            );
        }
    }

    Ok(())
}

fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path);
        }
        return Err(anyhow!(
            "Configuration file {} does not exist",
            path.display()
        ));
    }
    config_candidate_paths()
        .into_iter()
        .find(|path| path.exists())
        .ok_or_else(|| {
            anyhow!("No configuration file found; pass --config or create reportkeeper.yaml")
        })
}
