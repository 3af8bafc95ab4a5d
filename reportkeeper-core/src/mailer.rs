//! mailer.rs - Email message assembly and the mail-sender contract.
//!
//! Notification subjects and bodies are built by literal token replacement
//! against a record's attributes: each configured substitution pair maps a
//! token to either a field name (replaced with the record's rendered value)
//! or a literal string. Date-typed attributes arrive from the service as
//! epoch timestamps and are rendered human-readable.
//!
//! Sending is behind the `Mailer` trait so the pipeline can run against a
//! recording fake in tests; each send succeeds or fails atomically.
//!
//! License: MIT OR Apache-2.0

use anyhow::Result;
use chrono::DateTime;
use serde_json::Value;

use crate::records::Record;

/// One outgoing message, fully assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub reply_to: Option<String>,
    pub to: Vec<String>,
    pub subject: String,
    /// HTML body.
    pub body: String,
}

/// Sends assembled messages. Each call sends or fails atomically; at least
/// one recipient is required.
pub trait Mailer {
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Renders one attribute value for inclusion in a message.
///
/// Missing attributes and nulls render as the empty string. Values of
/// date-typed fields are epoch timestamps (seconds or milliseconds) and are
/// rendered in `%c` form; everything else renders as its plain string form.
pub fn render_attribute(record: &Record, field: &str, date_fields: &[String]) -> String {
    let value = match record.get(field) {
        Some(v) => v,
        None => return String::new(),
    };
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) if date_fields.iter().any(|f| f == field) => n
            .as_i64()
            .and_then(render_timestamp)
            .unwrap_or_else(|| n.to_string()),
        other => other.to_string(),
    }
}

/// Epoch seconds or milliseconds to `%c` text.
fn render_timestamp(raw: i64) -> Option<String> {
    // Feature services report dates in milliseconds; older data may carry
    // seconds. Anything too large to be seconds is treated as milliseconds.
    let seconds = if raw.abs() >= 100_000_000_000 { raw / 1000 } else { raw };
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.format("%c").to_string())
}

/// Builds the recipient address, subject, and body for one record.
///
/// `recipient` is either the name of an attribute holding the address or a
/// literal address. Each substitution pair `(token, source)` replaces `token`
/// in both subject and body with the record's rendered value when `source`
/// names an attribute, or with `source` itself otherwise. The caller decides
/// what to do with empty results.
pub fn build_email(
    record: &Record,
    date_fields: &[String],
    substitutions: &[(String, String)],
    recipient: &str,
    subject_template: &str,
    body_template: &str,
) -> (String, String, String) {
    let address = match record.get(recipient) {
        Some(value) => value.as_str().unwrap_or_default().to_string(),
        None => recipient.to_string(),
    };

    let mut subject = subject_template.to_string();
    let mut body = body_template.to_string();
    for (token, source) in substitutions {
        let replacement = if record.attributes.contains_key(source) {
            render_attribute(record, source, date_fields)
        } else {
            source.clone()
        };
        subject = subject.replace(token, &replacement);
        body = body.replace(token, &replacement);
    }

    (address, subject, body)
}
