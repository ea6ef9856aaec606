//! Mail transports: an HTTP relay for deployments and a log-only fallback.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::application::mail::{MailError, MailTransport, OutgoingEmail};

use super::error::InfraError;

const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts each message as JSON to a mail relay endpoint.
#[derive(Debug, Clone)]
pub struct HttpMailRelay {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpMailRelay {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, InfraError> {
        let client = reqwest::Client::builder()
            .timeout(RELAY_TIMEOUT)
            .build()
            .map_err(|err| InfraError::HttpClient(err.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl MailTransport for HttpMailRelay {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(email)
            .send()
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MailError::Rejected {
                status: status.as_u16(),
            });
        }

        info!(
            target = "infra::mail::HttpMailRelay::send",
            to = %email.to,
            subject = %email.subject,
            "email handed to relay"
        );
        Ok(())
    }
}

/// Logs messages instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailTransport;

#[async_trait]
impl MailTransport for LogMailTransport {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailError> {
        info!(
            target = "infra::mail::LogMailTransport::send",
            from = %email.from,
            to = %email.to,
            subject = %email.subject,
            body = %email.text,
            "email not sent; no relay configured"
        );
        Ok(())
    }
}
