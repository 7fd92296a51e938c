//! Operator email notification, best effort by design.
//!

use chrono::Local;
use lettre::{
    Address, Message, SmtpTransport, Transport,
    address::Envelope,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NotificationConfig;

/// Whether a notification reports a successful or a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The backup run succeeded.
    Success,
    /// The backup run failed.
    Failure,
}

/// Sends run summaries to the operator. Transport failures are logged and
/// swallowed, the run's outcome never depends on notification delivery.
pub struct Notifier {
    config: NotificationConfig,
}

impl Notifier {
    /// Create a notifier for the configured transport.
    pub fn new(config: NotificationConfig) -> Self {
        Self { config }
    }

    /// Send a notification, gated by the global flag and the per-kind flag
    /// independently. A generation timestamp is appended to the body.
    pub fn send(&self, kind: NotificationKind, subject: &str, body: &str) {
        if !self.config.enable {
            return;
        }

        match kind {
            NotificationKind::Success if !self.config.notify_on_success => {
                info!("Success notifications are disabled, skipping: {subject}");
                return;
            }
            NotificationKind::Failure if !self.config.notify_on_failure => {
                info!("Failure notifications are disabled, skipping: {subject}");
                return;
            }
            _ => {}
        }

        let subject = format!("[{}]{subject}", self.config.subject_prefix);
        info!("Sending notification email: {subject}");

        match self.try_send(&subject, body) {
            Ok(()) => info!("Notification email sent"),
            Err(error) => warn!("Could not send notification email: {error}"),
        }
    }

    fn try_send(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let full_body = format!("{body}\n\nTimestamp: {timestamp}");

        let from = Mailbox::new(
            Some(self.config.from_name.clone()),
            self.config.from_address.parse()?,
        );
        let to: Mailbox = self.config.to_address.parse()?;

        let mut builder = Message::builder()
            .from(from)
            .to(to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN);

        // Deliver from the SMTP account's own address where possible, some
        // servers reject envelope senders that don't match the account.
        if let Ok(sender) = self.config.smtp.username.parse::<Address>() {
            builder = builder.envelope(Envelope::new(Some(sender), vec![to.email])?);
        }

        let message = builder.body(full_body)?;

        let smtp = &self.config.smtp;
        let transport = if smtp.use_starttls {
            SmtpTransport::starttls_relay(&smtp.server)?
        } else {
            SmtpTransport::builder_dangerous(&smtp.server)
        };
        let mailer = transport
            .port(smtp.port)
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .build();

        mailer.send(&message)?;

        Ok(())
    }
}

#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid mailbox address:\n{0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build the message:\n{0}")]
    Message(#[from] lettre::error::Error),

    #[error("SMTP transport error:\n{0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}
