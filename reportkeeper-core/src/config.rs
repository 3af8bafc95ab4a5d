//! Configuration management for `reportkeeper-core`.
//!
//! This module defines the data structures for the services configuration
//! file: portal credentials, identifier sequences, moderation word lists and
//! substitutions, email settings, and the per-layer jobs to run. It handles
//! serialization/deserialization of YAML configurations and provides
//! utilities for loading, merging, validating, and writing back updated
//! sequence state.
//!
//! License: MIT OR Apache-2.0

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::screener::{compile_filter, SubstitutionMap, WordList};
use crate::sequences::{IdPattern, SequenceConfig};

/// Connection settings for the portal hosting the feature services.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PortalConfig {
    pub url: String,
    pub username: String,
    /// May be left empty and supplied through the environment instead.
    pub password: String,
}

/// Word lists and the shared character-substitution table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModerationSettings {
    pub substitutions: SubstitutionMap,
    pub lists: Vec<WordList>,
}

impl ModerationSettings {
    /// Loads the built-in substitution table and starter word lists from the
    /// embedded configuration.
    pub fn load_defaults() -> Result<Self> {
        debug!("Loading default moderation settings from embedded string...");
        let default_yaml = include_str!("../config/default_moderation.yaml");
        let settings: ModerationSettings =
            serde_yml::from_str(default_yaml).context("Failed to parse default moderation settings")?;
        Ok(settings)
    }

    pub fn list(&self, name: &str) -> Option<&WordList> {
        self.lists.iter().find(|l| l.name == name)
    }
}

/// SMTP connection and message-assembly settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailSettings {
    pub smtp_server: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub use_tls: bool,
    pub from_address: String,
    pub reply_to: String,
    /// Pairs of `[token, field-or-literal]` applied to subjects and bodies.
    pub substitutions: Vec<(String, String)>,
}

impl EmailSettings {
    /// True when an SMTP server is configured at all.
    pub fn configured(&self) -> bool {
        !self.smtp_server.is_empty()
    }
}

/// Identifier assignment step for one service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IdAssignment {
    /// Name of the sequence to draw identifiers from.
    pub sequence: String,
    /// Field to write the identifier into.
    pub field: String,
}

/// One enrichment source layer for a service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnrichmentLayer {
    pub url: String,
    /// Field in the source layer whose value is copied.
    pub source_field: String,
    /// Field in the target layer that receives the value.
    pub target_field: String,
    /// Layers are applied in ascending priority order, so the
    /// highest-priority layer is written last and wins.
    #[serde(default)]
    pub priority: i32,
    /// Extra filter ANDed onto the target query.
    #[serde(default)]
    pub sql: Option<String>,
}

fn default_sql() -> String {
    "1=1".to_string()
}

/// One moderation pass over a service's records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModerationJob {
    /// Names of word lists whose matches flag a record as explicit.
    #[serde(default)]
    pub explicit_lists: Vec<String>,
    /// Names of word lists whose matches flag a record as sensitive.
    #[serde(default)]
    pub sensitive_lists: Vec<String>,
    /// Semicolon-separated field names, scanned in this order.
    pub scan_fields: String,
    pub flag_field: String,
    pub flag_value: String,
    /// Field that accumulates reason text, when configured.
    #[serde(default)]
    pub reason_field: Option<String>,
    #[serde(default = "default_sql")]
    pub sql: String,
}

impl ModerationJob {
    /// Scan fields in declared order.
    pub fn scan_field_names(&self) -> Vec<&str> {
        self.scan_fields
            .split(';')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect()
    }
}

/// One email-notification pass over a service's records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EmailJob {
    #[serde(default = "default_sql")]
    pub sql: String,
    /// Field holding the recipient's address, or a literal address.
    pub recipient: String,
    pub subject: String,
    /// Path to the HTML body template, relative to the configuration file.
    pub template: String,
    /// Field updated once the message is sent.
    pub status_field: String,
    pub sent_value: String,
}

/// All jobs to run against one feature-service layer.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServiceConfig {
    pub url: String,
    #[serde(default)]
    pub id_assignment: Option<IdAssignment>,
    #[serde(default)]
    pub enrichment: Vec<EnrichmentLayer>,
    #[serde(default)]
    pub moderation: Vec<ModerationJob>,
    #[serde(default)]
    pub email: Vec<EmailJob>,
}

/// Represents the top-level configuration structure for ReportKeeper.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportKeeperConfig {
    pub portal: PortalConfig,
    pub sequences: Vec<SequenceConfig>,
    pub moderation: ModerationSettings,
    pub email: EmailSettings,
    pub services: Vec<ServiceConfig>,
}

impl ReportKeeperConfig {
    /// Loads and validates a configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ReportKeeperConfig = serde_yml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        info!(
            "Loaded {} sequence(s), {} word list(s), {} service(s) from {}.",
            config.sequences.len(),
            config.moderation.lists.len(),
            config.services.len(),
            path.display()
        );
        Ok(config)
    }

    /// Writes the configuration back to a YAML file. Used at the end of a
    /// run to persist advanced sequence values.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let text = serde_yml::to_string(self).context("Failed to serialize configuration")?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Replaces the stored sequence states with an allocator snapshot.
    /// Returns true if anything actually changed.
    pub fn update_sequences(&mut self, snapshot: Vec<SequenceConfig>) -> bool {
        if self.sequences == snapshot {
            return false;
        }
        self.sequences = snapshot;
        true
    }
}

/// Merges user-defined moderation settings with the built-in defaults.
///
/// User lists override default lists of the same name; a non-empty user
/// substitution table replaces the default one.
pub fn merge_moderation(
    default_settings: ModerationSettings,
    user_settings: Option<ModerationSettings>,
) -> ModerationSettings {
    let mut merged = default_settings;
    if let Some(user) = user_settings {
        debug!("Merging {} user word list(s) into defaults.", user.lists.len());
        for user_list in user.lists {
            match merged.lists.iter_mut().find(|l| l.name == user_list.name) {
                Some(existing) => *existing = user_list,
                None => merged.lists.push(user_list),
            }
        }
        if !user.substitutions.is_empty() {
            merged.substitutions = user.substitutions;
        }
    }
    merged
}

/// Candidate locations for the configuration file, in search order.
pub fn config_candidate_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("reportkeeper.yaml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("reportkeeper").join("reportkeeper.yaml"));
    }
    paths
}

/// Validates configuration integrity (sequence definitions, word-list
/// compilation, job field references).
fn validate_config(config: &ReportKeeperConfig) -> Result<()> {
    let mut errors = Vec::new();

    let mut sequence_names = HashSet::new();
    for seq in &config.sequences {
        if seq.name.is_empty() {
            errors.push("A sequence has an empty `name` field.".to_string());
        } else if !sequence_names.insert(seq.name.as_str()) {
            errors.push(format!("Duplicate sequence name found: '{}'.", seq.name));
        }
        if seq.interval <= 0 {
            errors.push(format!(
                "Sequence '{}' must have a positive interval (got {}).",
                seq.name, seq.interval
            ));
        }
        if let Err(e) = IdPattern::parse(&seq.pattern) {
            errors.push(e.to_string());
        }
    }

    let mut list_names = HashSet::new();
    for list in &config.moderation.lists {
        if list.name.is_empty() {
            errors.push("A word list has an empty `name` field.".to_string());
        } else if !list_names.insert(list.name.as_str()) {
            errors.push(format!("Duplicate word list name found: '{}'.", list.name));
        }
        if let Err(e) = compile_filter(list, &config.moderation.substitutions) {
            errors.push(e.to_string());
        }
    }

    for service in &config.services {
        if service.url.is_empty() {
            errors.push("A service has an empty `url` field.".to_string());
            continue;
        }
        if let Some(assignment) = &service.id_assignment {
            if assignment.field.is_empty() {
                errors.push(format!(
                    "Service {}: id assignment has an empty `field`.",
                    service.url
                ));
            }
        }
        for layer in &service.enrichment {
            if layer.url.is_empty() || layer.source_field.is_empty() || layer.target_field.is_empty()
            {
                errors.push(format!(
                    "Service {}: enrichment layers need `url`, `source_field`, and `target_field`.",
                    service.url
                ));
            }
        }
        for job in &service.moderation {
            if job.scan_field_names().is_empty() {
                errors.push(format!(
                    "Service {}: a moderation job has no scan fields.",
                    service.url
                ));
            }
            if job.flag_field.is_empty() {
                errors.push(format!(
                    "Service {}: a moderation job has an empty `flag_field`.",
                    service.url
                ));
            }
        }
        for job in &service.email {
            if job.recipient.is_empty() || job.status_field.is_empty() {
                errors.push(format!(
                    "Service {}: email jobs need `recipient` and `status_field`.",
                    service.url
                ));
            }
        }
    }

    if !errors.is_empty() {
        let full_error_message = format!("Configuration validation failed:\n{}", errors.join("\n"));
        Err(anyhow!(full_error_message))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screener::MatchMode;

    #[test]
    fn default_moderation_settings_load() {
        let defaults = ModerationSettings::load_defaults().unwrap();
        assert!(!defaults.substitutions.is_empty());
        assert!(defaults.list("explicit").is_some());
        assert_eq!(defaults.substitutions.get("O").map(String::as_str), Some("0"));
    }

    #[test]
    fn merge_prefers_user_lists_over_defaults() {
        let defaults = ModerationSettings::load_defaults().unwrap();
        let user = ModerationSettings {
            substitutions: SubstitutionMap::new(),
            lists: vec![WordList {
                name: "explicit".to_string(),
                words: "swan".to_string(),
                match_mode: MatchMode::Exact,
            }],
        };
        let merged = merge_moderation(defaults, Some(user));
        let explicit = merged.list("explicit").unwrap();
        assert_eq!(explicit.words, "swan");
        // Empty user substitutions keep the defaults.
        assert!(!merged.substitutions.is_empty());
    }

    #[test]
    fn update_sequences_reports_changes() {
        let mut config = ReportKeeperConfig {
            sequences: vec![SequenceConfig {
                name: "a".to_string(),
                interval: 1,
                next_value: 10,
                pattern: "{}".to_string(),
            }],
            ..Default::default()
        };

        let unchanged = config.sequences.clone();
        assert!(!config.update_sequences(unchanged));

        let mut advanced = config.sequences.clone();
        advanced[0].next_value = 13;
        assert!(config.update_sequences(advanced));
        assert_eq!(config.sequences[0].next_value, 13);
    }
}
