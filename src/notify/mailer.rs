//! Outbound mail delivery.
//!
//! The mailer is called at most once per project per pass and never
//! retries; retry and backoff policy belongs to the mail service.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::error::MailerError;
use crate::notify::digest::{Digest, render_html};

/// Digest delivery interface
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send one digest. Returns the transport's status text on success.
    async fn send_digest(&self, digest: &Digest) -> Result<String, MailerError>;
}

/// HTTP mailer posting to a Mailtrap-style bulk send API
pub struct HttpMailer {
    client: Client,
    base_url: String,
    api_key: String,
    from_email: String,
}

impl HttpMailer {
    pub fn new(base_url: String, api_key: String, from_email: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            from_email,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_digest(&self, digest: &Digest) -> Result<String, MailerError> {
        if digest.recipients.is_empty() {
            return Err(MailerError::NoRecipients(digest.project_name.clone()));
        }

        debug!(
            "Sending digest with {} events to {} recipients for {}",
            digest.events.len(),
            digest.recipients.len(),
            digest.project_name
        );

        let payload = json!({
            "from": {"email": self.from_email, "name": "depwatch"},
            "to": digest.recipients.iter().map(|r| json!({"email": r})).collect::<Vec<_>>(),
            "subject": digest.subject,
            "html": render_html(digest),
            "category": if digest.is_future_batch { "future-update" } else { "release-update" },
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(MailerError::Rejected(format!("{status}: {body}")));
        }

        Ok(format!("{status}: {body}"))
    }
}
