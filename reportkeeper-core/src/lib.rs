// reportkeeper-core/src/lib.rs
//! # ReportKeeper Core Library
//!
//! `reportkeeper-core` provides the platform-independent logic for automating
//! crowd-sourced GIS reporting layers: issuing sequential identifiers,
//! compiling word filters, moderating free-text fields, enriching records
//! from intersecting layers, and assembling email notifications. It defines
//! the data structures for the services configuration and implements the
//! pluggable `RecordStore` and `Mailer` traits that decouple the pipeline
//! from the concrete feature-service and SMTP clients.
//!
//! The library performs no network I/O of its own; everything remote is
//! reached through the trait seams, so the whole pipeline can be exercised
//! against in-memory fakes.
//!
//! ## Modules
//!
//! * `config`: Defines the services configuration file: sequences, word
//!   lists, substitutions, email settings, and per-layer jobs.
//! * `sequences`: The identifier allocator: gap-free, interval-stepped,
//!   exactly-once formatted identifiers per named sequence.
//! * `screener`: Compiles word lists into substitution-aware matching
//!   filters, built once and cached.
//! * `moderation`: The classification policy applied to scanned fields:
//!   explicit before sensitive, first match wins, reasons accumulate.
//! * `records`: The record model and the `RecordStore` contract.
//! * `mailer`: Email message assembly and the `Mailer` contract.
//! * `processor`: The per-service pipeline: identifiers, enrichment,
//!   moderation, notifications, with batched write-back.
//! * `errors`: The structured `CoreError` type.
//!
//! ## Usage Example
//!
//! ```rust
//! use reportkeeper_core::{IdAllocator, SequenceConfig};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!     let mut allocator = IdAllocator::from_config(&[SequenceConfig {
//!         name: "CONCERN".to_string(),
//!         interval: 5,
//!         next_value: 100,
//!         pattern: "CID-{:04d}".to_string(),
//!     }])?;
//!
//!     let issued = allocator.issue("CONCERN", 3)?;
//!     assert_eq!(issued, vec!["CID-0100", "CID-0105", "CID-0110"]);
//!     assert_eq!(allocator.next_value("CONCERN"), Some(115));
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! The library uses `anyhow::Error` for orchestration-level operations and
//! the structured `CoreError` for component-level failures such as
//! `UnknownSequence` and `InvalidPattern`.
//!
//! ---
//! License: MIT OR Apache-2.0

pub mod config;
pub mod errors;
pub mod mailer;
pub mod moderation;
pub mod processor;
pub mod records;
pub mod screener;
pub mod sequences;

/// Re-exports the public configuration types for the services file.
pub use config::{
    config_candidate_paths, merge_moderation, EmailJob, EmailSettings, EnrichmentLayer,
    IdAssignment, ModerationJob, ModerationSettings, PortalConfig, ReportKeeperConfig,
    ServiceConfig,
};

/// Re-exports the custom error type for clear error reporting.
pub use errors::CoreError;

/// Re-exports the identifier allocator and its configuration shape.
pub use sequences::{IdAllocator, IdPattern, SequenceConfig};

/// Re-exports the screener types for compiling and evaluating word filters.
pub use screener::{
    compile_filter, get_or_compile_filter, CompiledFilter, MatchMode, SubstitutionMap, WordList,
};

/// Re-exports the moderation policy types.
pub use moderation::{append_reason, Category, ModerationResult, Moderator};

/// Re-exports the record model and the store contract.
pub use records::{Attributes, EditOutcome, Record, RecordStore, StoreOpener};

/// Re-exports email assembly and the mail-sender contract.
pub use mailer::{build_email, render_attribute, EmailMessage, Mailer};

/// Re-exports the service-processing pipeline.
pub use processor::{report_failures, Processor, RunSummary, ServiceSummary};
