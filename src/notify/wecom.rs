//! WeCom (企业微信) group-robot webhook.
//!
//! POSTs `{chatid, msgtype: "markdown", markdown: {content, mentioned_list?}}`
//! to the configured webhook URL. HTTP 200 means delivered.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{Notice, Notifier};
use crate::config::{Secrets, WebhookConfig};

/// Mention audience used when no user is configured.
const MENTION_ALL: &str = "@all";

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    chatid: &'a str,
    msgtype: &'static str,
    markdown: Markdown<'a>,
}

#[derive(Debug, Serialize)]
struct Markdown<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mentioned_list: Option<Vec<&'a str>>,
}

pub struct WeComNotifier {
    http: Client,
    webhook_url: SecretString,
    chat_id: String,
    mention: Option<String>,
}

impl WeComNotifier {
    pub fn new(cfg: &WebhookConfig, secrets: &Secrets) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("Failed to build HTTP client for webhook")?;

        Ok(Self {
            http,
            webhook_url: secrets.webhook_url.clone(),
            chat_id: secrets.chat_id.clone(),
            mention: secrets.mention.clone(),
        })
    }

    fn payload<'a>(&'a self, notice: &'a Notice) -> WebhookPayload<'a> {
        let mentioned_list = notice
            .is_urgent()
            .then(|| vec![self.mention.as_deref().unwrap_or(MENTION_ALL)]);
        WebhookPayload {
            chatid: &self.chat_id,
            msgtype: "markdown",
            markdown: Markdown {
                content: &notice.content,
                mentioned_list,
            },
        }
    }
}

#[async_trait]
impl Notifier for WeComNotifier {
    async fn send(&self, notice: &Notice) -> Result<()> {
        let resp = self
            .http
            .post(self.webhook_url.expose_secret())
            .json(&self.payload(notice))
            .send()
            .await
            .context("Webhook request failed")?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        debug!(status = %status, body = %body, "Webhook response");

        if status != StatusCode::OK {
            anyhow::bail!("Webhook returned {status}: {body}");
        }

        info!(kind = %notice.kind, "Notification delivered");
        Ok(())
    }
}
