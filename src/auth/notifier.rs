use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::instrument;

use crate::config::SmtpConfig;

const SUBJECT: &str = "Email Verification Code";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("could not build message: {0}")]
    Build(String),
    #[error("delivery failed: {0}")]
    Transport(String),
}

/// Out-of-band delivery of verification codes.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_verification_code(&self, email: &str, code: &str) -> Result<(), NotifyError>;
}

pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig, timeout: Duration) -> anyhow::Result<Self> {
        let sender: Mailbox = cfg.from.parse().context("EMAIL_FROM is not a valid address")?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("build smtp transport")?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .timeout(Some(timeout))
            .build();
        Ok(Self { mailer, sender })
    }
}

pub(crate) fn verification_message(
    sender: &Mailbox,
    recipient: &str,
    code: &str,
) -> Result<Message, NotifyError> {
    let to: Mailbox = recipient
        .parse()
        .map_err(|e| NotifyError::Build(format!("invalid recipient: {e}")))?;
    Message::builder()
        .from(sender.clone())
        .to(to)
        .subject(SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(format!("Your verification code is: {code}"))
        .map_err(|e| NotifyError::Build(e.to_string()))
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(name = "smtp_send", skip(self, code))]
    async fn send_verification_code(&self, email: &str, code: &str) -> Result<(), NotifyError> {
        let message = verification_message(&self.sender, email, code)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}
