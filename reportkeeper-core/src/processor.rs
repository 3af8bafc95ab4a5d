//! processor.rs - The service-processing pipeline.
//!
//! Runs the configured jobs against each feature-service layer in order:
//! identifier assignment, enrichment from intersecting layers, moderation of
//! free-text fields, and email notification. Every write-back goes through
//! the store as one batch per pass, with per-record outcomes reported as
//! structured log entries.
//!
//! Fault policy: a failure in one record, pass, or service is logged and
//! skipped; it never aborts the rest of the run. Identifier issuance and
//! record commit are separate concerns: sequence state advances for every
//! issued value even when some commits fail downstream.
//!
//! License: MIT OR Apache-2.0

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{
    merge_moderation, EmailJob, EmailSettings, EnrichmentLayer, IdAssignment, ModerationJob,
    ModerationSettings, ReportKeeperConfig, ServiceConfig,
};
use crate::mailer::{build_email, EmailMessage, Mailer};
use crate::moderation::Moderator;
use crate::records::{EditOutcome, RecordStore, StoreOpener};
use crate::screener::{get_or_compile_filter, CompiledFilter};
use crate::sequences::{IdAllocator, SequenceConfig};

/// Counters for one processed service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSummary {
    pub url: String,
    pub ids_assigned: usize,
    pub enriched: usize,
    pub flagged: usize,
    pub emails_sent: usize,
    pub failures: usize,
}

/// Counters for a whole run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub services: Vec<ServiceSummary>,
}

impl RunSummary {
    pub fn total_failures(&self) -> usize {
        self.services.iter().map(|s| s.failures).sum()
    }
}

/// Executes every configured job for every configured service.
///
/// Word filters are compiled once at construction; the allocator owns all
/// sequence state for the run and exposes its final values through
/// [`Processor::sequence_snapshot`] for write-back.
pub struct Processor {
    services: Vec<ServiceConfig>,
    email_settings: EmailSettings,
    filters: HashMap<String, Arc<CompiledFilter>>,
    allocator: IdAllocator,
    /// Directory email body templates are resolved against.
    template_root: PathBuf,
}

impl Processor {
    pub fn new(config: &ReportKeeperConfig, template_root: impl Into<PathBuf>) -> Result<Self> {
        let moderation = merge_moderation(
            ModerationSettings::load_defaults()?,
            Some(config.moderation.clone()),
        );

        let mut filters = HashMap::new();
        for list in &moderation.lists {
            let filter = get_or_compile_filter(list, &moderation.substitutions)
                .with_context(|| format!("Failed to compile word list '{}'", list.name))?;
            filters.insert(list.name.clone(), filter);
        }

        let allocator = IdAllocator::from_config(&config.sequences)
            .context("Failed to load identifier sequences")?;

        Ok(Self {
            services: config.services.clone(),
            email_settings: config.email.clone(),
            filters,
            allocator,
            template_root: template_root.into(),
        })
    }

    /// Processes every service and returns the run counters.
    pub fn run(&mut self, opener: &dyn StoreOpener, mailer: Option<&dyn Mailer>) -> RunSummary {
        let run_id = Uuid::new_v4();
        info!("Starting run {} over {} service(s)", run_id, self.services.len());

        let services = self.services.clone();
        let mut summaries = Vec::with_capacity(services.len());
        for service in &services {
            summaries.push(self.process_service(opener, mailer, service));
        }

        let summary = RunSummary {
            run_id,
            services: summaries,
        };
        info!(
            "Run {} finished with {} failure(s)",
            run_id,
            summary.total_failures()
        );
        summary
    }

    /// Final sequence states for persistence.
    pub fn sequence_snapshot(&self) -> Vec<SequenceConfig> {
        self.allocator.snapshot()
    }

    fn process_service(
        &mut self,
        opener: &dyn StoreOpener,
        mailer: Option<&dyn Mailer>,
        service: &ServiceConfig,
    ) -> ServiceSummary {
        let mut summary = ServiceSummary {
            url: service.url.clone(),
            ..Default::default()
        };

        info!("Processing service {}", service.url);
        let store = match opener.open(&service.url) {
            Ok(store) => store,
            Err(e) => {
                error!(
                    "Could not connect to {}. Please verify paths and credentials. {:#}",
                    service.url, e
                );
                summary.failures += 1;
                return summary;
            }
        };

        if let Some(assignment) = &service.id_assignment {
            if let Err(e) = self.assign_ids(store.as_ref(), assignment, &mut summary) {
                error!(
                    "Failed to assign identifiers for service {}: {:#}",
                    service.url, e
                );
                summary.failures += 1;
            }
        }

        if !service.enrichment.is_empty() {
            self.enrich(store.as_ref(), opener, &service.enrichment, &mut summary);
        }

        for job in &service.moderation {
            if let Err(e) = self.moderate(store.as_ref(), job, &mut summary) {
                error!("Failed to moderate service {}: {:#}", service.url, e);
                summary.failures += 1;
            }
        }

        for job in &service.email {
            if let Err(e) = self.send_emails(store.as_ref(), mailer, job, &mut summary) {
                error!(
                    "Failed to send notifications for service {}: {:#}",
                    service.url, e
                );
                summary.failures += 1;
            }
        }

        summary
    }

    /// Issues one identifier per record missing one and writes them back.
    fn assign_ids(
        &mut self,
        store: &dyn RecordStore,
        assignment: &IdAssignment,
        summary: &mut ServiceSummary,
    ) -> Result<()> {
        if !self.allocator.contains(&assignment.sequence) {
            warn!(
                "Sequence {} not found in sequence settings",
                assignment.sequence
            );
            return Ok(());
        }

        let sql = format!("{} IS NULL", assignment.field);
        let mut rows = store.query(&sql)?;
        if rows.is_empty() {
            return Ok(());
        }

        let ids = self.allocator.issue(&assignment.sequence, rows.len())?;
        for (row, id) in rows.iter_mut().zip(ids) {
            row.set(&assignment.field, Value::String(id));
        }

        let outcomes = store.apply_edits(&rows)?;
        let failed = report_failures(&outcomes);
        summary.failures += failed;
        summary.ids_assigned += rows.len() - failed;
        Ok(())
    }

    /// Copies attributes from intersecting source-layer features into the
    /// target layer, lowest priority first so the top layer wins.
    fn enrich(
        &mut self,
        store: &dyn RecordStore,
        opener: &dyn StoreOpener,
        layers: &[EnrichmentLayer],
        summary: &mut ServiceSummary,
    ) {
        let mut ordered: Vec<&EnrichmentLayer> = layers.iter().collect();
        ordered.sort_by_key(|l| l.priority);

        for layer in ordered {
            if let Err(e) = self.enrich_from_layer(store, opener, layer, summary) {
                error!("Failed to enrich from layer {}: {:#}", layer.url, e);
                summary.failures += 1;
            }
        }
    }

    fn enrich_from_layer(
        &mut self,
        store: &dyn RecordStore,
        opener: &dyn StoreOpener,
        layer: &EnrichmentLayer,
        summary: &mut ServiceSummary,
    ) -> Result<()> {
        let source = opener.open(&layer.url)?;

        let mut sql = format!("{} IS NULL", layer.target_field);
        if let Some(extra) = layer.sql.as_deref() {
            if !extra.is_empty() && extra != "1=1" {
                sql.push_str(" AND ");
                sql.push_str(extra);
            }
        }

        for polygon in source.query("1=1")? {
            let geometry = match &polygon.geometry {
                Some(geometry) => geometry,
                None => continue,
            };
            let value = match polygon.get(&layer.source_field) {
                Some(value) if !value.is_null() => value.clone(),
                _ => continue,
            };

            let mut targets = store.query_intersecting(geometry, &sql)?;
            if targets.is_empty() {
                continue;
            }
            for target in &mut targets {
                target.set(&layer.target_field, value.clone());
            }

            let outcomes = store.apply_edits(&targets)?;
            let failed = report_failures(&outcomes);
            summary.failures += failed;
            summary.enriched += targets.len() - failed;
        }
        Ok(())
    }

    /// Scans configured fields for prohibited words and flags matches.
    fn moderate(
        &mut self,
        store: &dyn RecordStore,
        job: &ModerationJob,
        summary: &mut ServiceSummary,
    ) -> Result<()> {
        let explicit = self.resolve_filters(&job.explicit_lists);
        let sensitive = self.resolve_filters(&job.sensitive_lists);
        if explicit.is_empty() && sensitive.is_empty() {
            warn!("Moderation job has no usable word lists; skipping");
            return Ok(());
        }
        let moderator = Moderator::new(explicit, sensitive);

        let rows = store.query(&job.sql)?;
        let scan_fields = job.scan_field_names();
        let mut changed = Vec::new();

        for mut row in rows {
            // Empty and non-string fields are skipped, not errors.
            let texts: Vec<String> = scan_fields
                .iter()
                .filter_map(|f| row.get_str(f).map(str::to_string))
                .collect();
            let prior = job
                .reason_field
                .as_deref()
                .and_then(|f| row.get_str(f))
                .map(str::to_string);

            let result = moderator.moderate(texts.iter().map(String::as_str), prior.as_deref());
            if result.flagged {
                row.set(&job.flag_field, Value::String(job.flag_value.clone()));
                if let Some(reason_field) = &job.reason_field {
                    row.set(reason_field, Value::String(result.reason));
                }
                changed.push(row);
            }
        }

        if !changed.is_empty() {
            let outcomes = store.apply_edits(&changed)?;
            let failed = report_failures(&outcomes);
            summary.failures += failed;
            summary.flagged += changed.len() - failed;
        }
        Ok(())
    }

    /// Sends one notification per matching record and marks successful sends.
    fn send_emails(
        &mut self,
        store: &dyn RecordStore,
        mailer: Option<&dyn Mailer>,
        job: &EmailJob,
        summary: &mut ServiceSummary,
    ) -> Result<()> {
        let mailer = match mailer {
            Some(mailer) => mailer,
            None => {
                warn!("No mail server configured; skipping email job for {}", store.url());
                return Ok(());
            }
        };

        let template_path = self.template_root.join(&job.template);
        let body_template = std::fs::read_to_string(&template_path)
            .with_context(|| format!("Failed to read email template {}", template_path.display()))?;

        let date_fields = store.date_fields();
        let rows = store.query(&job.sql)?;
        let mut sent = Vec::new();

        for mut row in rows {
            let (address, subject, body) = build_email(
                &row,
                &date_fields,
                &self.email_settings.substitutions,
                &job.recipient,
                &job.subject,
                &body_template,
            );
            if address.is_empty() || subject.is_empty() || body.is_empty() {
                warn!(
                    "Skipping notification for record {}: no address, subject, or body",
                    row.label()
                );
                continue;
            }

            let message = EmailMessage {
                from: self.email_settings.from_address.clone(),
                reply_to: (!self.email_settings.reply_to.is_empty())
                    .then(|| self.email_settings.reply_to.clone()),
                to: vec![address],
                subject,
                body,
            };

            match mailer.send(&message) {
                Ok(()) => {
                    row.set(&job.status_field, Value::String(job.sent_value.clone()));
                    sent.push(row);
                }
                Err(e) => {
                    error!(
                        "Email failed to send for record {} in layer {}: {:#}",
                        row.label(),
                        store.url(),
                        e
                    );
                    summary.failures += 1;
                }
            }
        }

        if !sent.is_empty() {
            let outcomes = store.apply_edits(&sent)?;
            let failed = report_failures(&outcomes);
            summary.failures += failed;
            summary.emails_sent += sent.len() - failed;
        }
        Ok(())
    }

    /// Looks up compiled filters by list name, warning on unknown names.
    fn resolve_filters(&self, names: &[String]) -> Vec<Arc<CompiledFilter>> {
        let mut resolved = Vec::with_capacity(names.len());
        for name in names {
            match self.filters.get(name) {
                Some(filter) => resolved.push(Arc::clone(filter)),
                None => warn!("Moderation list {} not found in moderation settings", name),
            }
        }
        resolved
    }
}

/// Logs each failed edit outcome and returns the failure count.
pub fn report_failures(outcomes: &[EditOutcome]) -> usize {
    let mut failures = 0;
    for outcome in outcomes {
        if !outcome.success {
            failures += 1;
            error!(
                "Record {}: {}: {}",
                outcome.object_id,
                outcome.error_code.unwrap_or_default(),
                outcome
                    .error_message
                    .as_deref()
                    .unwrap_or("unknown error")
            );
        }
    }
    failures
}
