use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// Out-of-band delivery of password reset links.
#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset(&self, to: &str, link: &str) -> anyhow::Result<()>;
}

/// Development mailer: writes the link to the log instead of sending it.
pub struct LogMailer;

#[async_trait]
impl ResetMailer for LogMailer {
    async fn send_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
        info!(to, link, "Password reset link (log mailer, not delivered)");
        Ok(())
    }
}

#[derive(Serialize)]
struct WebhookMail<'a> {
    to: &'a str,
    subject: &'a str,
    body: String,
}

/// Posts the message as JSON to a mail relay webhook.
pub struct WebhookMailer {
    client: reqwest::Client,
    url: String,
}

impl WebhookMailer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl ResetMailer for WebhookMailer {
    async fn send_reset(&self, to: &str, link: &str) -> anyhow::Result<()> {
        let mail = WebhookMail {
            to,
            subject: "Reset your AQI Dashboard password",
            body: format!(
                "A password reset was requested for your account.\n\n\
                 Open this link within 15 minutes to choose a new password:\n{}\n\n\
                 If you did not ask for this, ignore this message.",
                link
            ),
        };

        self.client
            .post(&self.url)
            .json(&mail)
            .send()
            .await?
            .error_for_status()?;

        info!(to, "Password reset mail handed to webhook");
        Ok(())
    }
}
