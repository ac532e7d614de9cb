//! SMTP email notifier.

use super::{render, DeliveryResult, Notifier, NotifyError};
use crate::config::EmailConfig;
use crate::monitor::AlertEvent;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

/// Sends plain-text alert emails through a STARTTLS SMTP relay.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    target: String,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|e: lettre::address::AddressError| NotifyError::Email(format!("{:?}: {}", address, e)))
}

impl EmailNotifier {
    pub fn new(config: &EmailConfig, target: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&config.from)?;
        let to = parse_mailbox(&config.to)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_server)?
            .port(config.smtp_port)
            .credentials(Credentials::new(config.from.clone(), config.password.clone()))
            .timeout(Some(timeout))
            .build();

        Ok(Self {
            transport,
            from,
            to,
            target: target.to_string(),
        })
    }

    fn compose(&self, subject: String, body: String) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| NotifyError::Email(e.to_string()))
    }

    /// Build the email for `event`.
    pub fn build_message(&self, event: &AlertEvent) -> Result<Message, NotifyError> {
        self.compose(
            render::email_subject(&self.target, event),
            render::email_body(&self.target, event),
        )
    }

    /// Send a free-form plain-text email.
    pub async fn send_plain(&self, subject: &str, body: &str) -> DeliveryResult {
        let message = self.compose(subject.to_string(), body.to_string())?;
        self.transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn deliver(&self, event: &AlertEvent) -> DeliveryResult {
        let message = self.build_message(event)?;
        self.transport.send(message).await?;
        Ok(())
    }
}
