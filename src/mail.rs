use axum::async_trait;
use serde_json::json;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail provider returned status {0}")]
    Provider(u16),
}

/// Outbound mail contract: deliver a plain-text message or fail.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), MailError>;
}

/// Delivers through an HTTP mail provider (JSON POST, bearer auth).
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_token: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_token: &str, from: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.to_string(),
            api_token: api_token.to_string(),
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), MailError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_token)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": text,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(MailError::Provider(response.status().as_u16()));
        }

        info!(%to, %subject, "mail sent");
        Ok(())
    }
}

/// Local dev sender that logs the message instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, text: &str) -> Result<(), MailError> {
        info!(%to, %subject, %text, "mail send stub");
        Ok(())
    }
}
