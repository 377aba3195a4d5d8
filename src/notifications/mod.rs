use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

use crate::config::MailConfig;

/// Outbound mail errors. Delivery is fire-and-forget from the services'
/// perspective: a failure is reported to the caller but never rolls back the
/// state that prompted the mail.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport error: {0}")]
    Transport(String),
    #[error("mail relay rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Transactional mail interface used by the account service.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_activation_email(&self, recipient: &str, activation_url: &str)
        -> Result<(), MailError>;

    async fn send_password_reset_email(&self, recipient: &str, reset_url: &str)
        -> Result<(), MailError>;
}

#[derive(Debug, Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: String,
}

/// Mailer that posts messages to an HTTP mail relay.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, sender: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint,
            sender,
        }
    }

    async fn deliver(&self, mail: OutgoingMail<'_>) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&mail)
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }

        Ok(())
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, activation_url))]
    async fn send_activation_email(
        &self,
        recipient: &str,
        activation_url: &str,
    ) -> Result<(), MailError> {
        let body = format!(
            "Hello,\n\n\
             Thanks for signing up. Use the following link to activate your account:\n\
             {}\n\n\
             If you did not create an account, please ignore this email.\n",
            activation_url
        );
        self.deliver(OutgoingMail {
            from: &self.sender,
            to: recipient,
            subject: "Activate Your Account",
            body,
        })
        .await
    }

    #[instrument(skip(self, reset_url))]
    async fn send_password_reset_email(
        &self,
        recipient: &str,
        reset_url: &str,
    ) -> Result<(), MailError> {
        let body = format!(
            "Hello,\n\n\
             You requested a password reset for your account. Use the following link to reset your password:\n\
             {}\n\n\
             If you did not request a password reset, please ignore this email.\n",
            reset_url
        );
        self.deliver(OutgoingMail {
            from: &self.sender,
            to: recipient,
            subject: "Password Reset Request",
            body,
        })
        .await
    }
}

/// Mailer that only records messages to the log. Used in development and in
/// deployments without a configured relay.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_activation_email(
        &self,
        recipient: &str,
        activation_url: &str,
    ) -> Result<(), MailError> {
        info!(recipient, activation_url, "activation email (log only)");
        Ok(())
    }

    async fn send_password_reset_email(
        &self,
        recipient: &str,
        reset_url: &str,
    ) -> Result<(), MailError> {
        info!(recipient, reset_url, "password reset email (log only)");
        Ok(())
    }
}

/// Builds the configured mailer: HTTP relay when an endpoint is set,
/// otherwise log-only.
pub fn mailer_from_config(cfg: &MailConfig) -> Arc<dyn Mailer> {
    match &cfg.endpoint {
        Some(endpoint) => Arc::new(HttpMailer::new(endpoint.clone(), cfg.sender.clone())),
        None => Arc::new(LogMailer),
    }
}
