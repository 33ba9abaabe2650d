//! Plain SMTP delivery of administrator and user reports, to a single
//! configured relay.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use p4dti_config::SmtpConfig;
use tracing::{info, warn};

use crate::error::{NotifyError, Result};
use crate::wrap::{wrap, DEFAULT_WRAP_COLUMN};

/// Sends composed reports over SMTP.
pub trait Notifier: Send + Sync {
    /// Sends a report to a single recipient. `body` is wrapped at
    /// [`DEFAULT_WRAP_COLUMN`] before sending.
    fn send_report(&self, to: &str, subject: &str, body: &str) -> Result<()>;

    /// Sends a report to the configured administrator address.
    fn send_admin_report(&self, subject: &str, body: &str) -> Result<()>;
}

/// [`Notifier`] backed by a real SMTP relay.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
    admin: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let mut builder = SmtpTransport::builder_dangerous(&config.relay_host).port(config.relay_port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }
        let transport = builder.build();

        let from = parse_mailbox(&config.from_address)?;
        let admin = parse_mailbox(&config.admin_address)?;

        Ok(Self { transport, from, admin })
    }
}

impl Notifier for SmtpNotifier {
    fn send_report(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to_mailbox = parse_mailbox(to)?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(subject)
            .body(wrap(body, DEFAULT_WRAP_COLUMN))
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        match self.transport.send(&message) {
            Ok(_) => {
                info!(%to, %subject, "sent notification");
                Ok(())
            }
            Err(e) => {
                warn!(%to, %subject, error = %e, "failed to send notification");
                Err(NotifyError::Delivery(e.to_string()))
            }
        }
    }

    fn send_admin_report(&self, subject: &str, body: &str) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.admin.clone())
            .subject(subject)
            .body(wrap(body, DEFAULT_WRAP_COLUMN))
            .map_err(|e| NotifyError::Message(e.to_string()))?;

        self.transport
            .send(&message)
            .map(|_| ())
            .map_err(|e| NotifyError::Delivery(e.to_string()))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address.parse().map_err(|_| NotifyError::Message(format!("'{address}' is not a valid email address")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_address() {
        assert!(parse_mailbox("not-an-address").is_err());
    }

    #[test]
    fn accepts_well_formed_address() {
        assert!(parse_mailbox("dt-admin@example.com").is_ok());
    }
}
