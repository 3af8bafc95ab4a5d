// reportkeeper-core/tests/config_integration_tests.rs
use anyhow::Result;
use std::io::Write;
use tempfile::NamedTempFile;

// Import the specific types and functions needed from the main crate's config module
use reportkeeper_core::config::ReportKeeperConfig;
use reportkeeper_core::screener::MatchMode;
use reportkeeper_core::sequences::SequenceConfig;

const FULL_CONFIG: &str = r#"
portal:
  url: "https://example.org/portal"
  username: "automation"
  password: ""
sequences:
  - name: CONCERN
    interval: 5
    next_value: 100
    pattern: "CID-{:04d}"
moderation:
  substitutions:
    O: "0"
  lists:
    - name: profanity
      words: "goose, gull"
      match_mode: substring
email:
  smtp_server: "smtp.example.org"
  use_tls: true
  from_address: "noreply@example.org"
  reply_to: ""
  substitutions:
    - ["{id}", "reqid"]
services:
  - url: "https://example.org/layer/0"
    id_assignment:
      sequence: CONCERN
      field: reqid
    moderation:
      - explicit_lists: [profanity]
        scan_fields: "details;location"
        flag_field: visible
        flag_value: "NO"
        reason_field: reason
        sql: "status = 'SUBMITTED'"
    email:
      - sql: "sent IS NULL"
        recipient: submitter
        subject: "Thank you for your submission"
        template: "user_email_template.html"
        status_field: sent
        sent_value: "Yes"
"#;

#[test]
fn test_load_full_config() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(FULL_CONFIG.as_bytes())?;

    let config = ReportKeeperConfig::load_from_file(file.path())?;
    assert_eq!(config.portal.username, "automation");
    assert_eq!(config.sequences.len(), 1);
    assert_eq!(config.sequences[0].pattern, "CID-{:04d}");
    assert_eq!(config.moderation.lists[0].match_mode, MatchMode::Substring);
    assert_eq!(config.services.len(), 1);

    let service = &config.services[0];
    assert_eq!(service.id_assignment.as_ref().unwrap().sequence, "CONCERN");
    assert_eq!(
        service.moderation[0].scan_field_names(),
        vec!["details", "location"]
    );
    assert_eq!(service.email[0].sent_value, "Yes");
    Ok(())
}

#[test]
fn test_omitted_sections_default() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(b"services: []\n")?;

    let config = ReportKeeperConfig::load_from_file(file.path())?;
    assert!(config.sequences.is_empty());
    assert!(config.moderation.lists.is_empty());
    assert!(!config.email.configured());
    Ok(())
}

#[test]
fn test_moderation_job_sql_defaults_to_match_all() -> Result<()> {
    let yaml = r#"
services:
  - url: "https://example.org/layer/0"
    moderation:
      - explicit_lists: [words]
        scan_fields: "details"
        flag_field: visible
        flag_value: "NO"
moderation:
  lists:
    - name: words
      words: "goose"
      match_mode: substring
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;

    let config = ReportKeeperConfig::load_from_file(file.path())?;
    assert_eq!(config.services[0].moderation[0].sql, "1=1");
    Ok(())
}

#[test]
fn test_duplicate_sequence_names_rejected() -> Result<()> {
    let yaml = r#"
sequences:
  - { name: a, interval: 1, next_value: 1, pattern: "{}" }
  - { name: a, interval: 2, next_value: 5, pattern: "{}" }
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;

    let err = ReportKeeperConfig::load_from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("Duplicate sequence name"));
    Ok(())
}

#[test]
fn test_bad_interval_and_pattern_rejected() -> Result<()> {
    let yaml = r#"
sequences:
  - { name: a, interval: 0, next_value: 1, pattern: "{}" }
  - { name: b, interval: 1, next_value: 1, pattern: "no placeholder" }
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;

    let err = ReportKeeperConfig::load_from_file(file.path()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("positive interval"));
    assert!(message.contains("no placeholder"));
    Ok(())
}

#[test]
fn test_moderation_job_without_scan_fields_rejected() -> Result<()> {
    let yaml = r#"
services:
  - url: "https://example.org/layer/0"
    moderation:
      - explicit_lists: [words]
        scan_fields: " ; "
        flag_field: visible
        flag_value: "NO"
"#;
    let mut file = NamedTempFile::new()?;
    file.write_all(yaml.as_bytes())?;

    assert!(ReportKeeperConfig::load_from_file(file.path()).is_err());
    Ok(())
}

#[test]
fn test_sequence_write_back_round_trip() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    file.write_all(FULL_CONFIG.as_bytes())?;

    let mut config = ReportKeeperConfig::load_from_file(file.path())?;
    let changed = config.update_sequences(vec![SequenceConfig {
        name: "CONCERN".to_string(),
        interval: 5,
        next_value: 115,
        pattern: "CID-{:04d}".to_string(),
    }]);
    assert!(changed);

    config.save_to_file(file.path())?;

    let reloaded = ReportKeeperConfig::load_from_file(file.path())?;
    assert_eq!(reloaded.sequences[0].next_value, 115);
    // Everything else survives the round trip.
    assert_eq!(reloaded.services, config.services);
    assert_eq!(reloaded.email, config.email);
    Ok(())
}
