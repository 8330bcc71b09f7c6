//! Email sending — SMTP via lettre, rustls transport.

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::ExposeSecret;

use crate::config::SmtpConfig;
use crate::error::ChannelError;

/// SMTP sender for the email channel.
pub struct EmailSender {
    config: SmtpConfig,
}

impl EmailSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Send an email via the configured SMTP relay.
    pub fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), ChannelError> {
        let send_failed = |reason: String| ChannelError::SendFailed {
            channel: "email".to_string(),
            reason,
        };

        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );

        let transport = SmtpTransport::relay(&self.config.host)
            .map_err(|e| send_failed(format!("SMTP relay error: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .build();

        let email = Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| send_failed(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| send_failed(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| send_failed(format!("Failed to build email: {e}")))?;

        transport
            .send(&email)
            .map(|_| ())
            .map_err(|e| send_failed(format!("SMTP send error: {e}")))
    }
}
