// reportkeeper/src/lib.rs
//! # ReportKeeper CLI Application
//!
//! This crate provides the command-line runner for the ReportKeeper pipeline:
//! it loads the services configuration, connects to the portal and the SMTP
//! server, runs every configured pass through `reportkeeper-core`, prints a
//! run summary, and writes advanced sequence values back to the
//! configuration file.

pub mod cli;
pub mod feature_service;
pub mod logger;
pub mod mailer;
pub mod report;
