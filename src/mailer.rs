use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::MAIL_TIMEOUT_SECS;
use crate::error::{AppError, Result};

/// Outbound mail collaborator. Rendering lives with the caller; this seam
/// only delivers. A returned `Ok(())` means the service confirmed the send.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str, text: &str) -> Result<()>;
}

#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

/// Delivers through the transactional mail service's HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, from: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(MAIL_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, api_url, from })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str, text: &str) -> Result<()> {
        let payload = MailPayload { from: &self.from, to, subject, html, text };
        let resp = self.client.post(&self.api_url).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::Mail(format!(
                "mail service returned {} for {to}",
                resp.status()
            )));
        }
        Ok(())
    }
}
