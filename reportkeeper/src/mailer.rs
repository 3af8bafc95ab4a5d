// reportkeeper/src/mailer.rs
//! SMTP implementation of the core `Mailer` contract.
//!
//! One transport is built per run from the configured email settings and
//! reused for every notification; each send succeeds or fails atomically.

use anyhow::{anyhow, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use reportkeeper_core::config::EmailSettings;
use reportkeeper_core::mailer::{EmailMessage, Mailer};

pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    /// Builds a transport from the configured settings. STARTTLS is used when
    /// `use_tls` is set; credentials are optional.
    pub fn connect(settings: &EmailSettings) -> Result<Self> {
        let mut builder = if settings.use_tls {
            SmtpTransport::starttls_relay(&settings.smtp_server).with_context(|| {
                format!("Failed to configure STARTTLS for {}", settings.smtp_server)
            })?
        } else {
            SmtpTransport::builder_dangerous(&settings.smtp_server)
        };

        if !settings.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.smtp_username.clone(),
                settings.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
        })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        if message.to.is_empty() {
            return Err(anyhow!("You must provide at least one e-mail recipient"));
        }

        let from: Mailbox = message
            .from
            .parse()
            .with_context(|| format!("Invalid from address '{}'", message.from))?;
        let mut builder = Message::builder()
            .from(from)
            .subject(message.subject.clone());
        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(
                reply_to
                    .parse()
                    .with_context(|| format!("Invalid reply-to address '{}'", reply_to))?,
            );
        }
        for to in &message.to {
            builder = builder.to(to
                .parse()
                .with_context(|| format!("Invalid recipient address '{}'", to))?);
        }

        let email = builder
            .header(ContentType::TEXT_HTML)
            .body(message.body.clone())
            .context("Failed to assemble email")?;

        self.transport
            .send(&email)
            .context("SMTP server rejected the message")?;
        Ok(())
    }
}
