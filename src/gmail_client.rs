use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, error, info};
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::composer::{ComposeError, OutboundMessage};
use crate::config::GmailConfig;
use crate::credential_store::{AuthError, Authorizer};

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Compose(#[from] ComposeError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gmail API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Outcome of a Send action, displayed verbatim in the status field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    Sent { recipient: String },
    Failed { reason: String },
}

impl SendResult {
    pub fn failed(reason: impl fmt::Display) -> Self {
        SendResult::Failed {
            reason: reason.to_string(),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, SendResult::Sent { .. })
    }
}

impl fmt::Display for SendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendResult::Sent { recipient } => write!(f, "✅ Email sent successfully to {}", recipient),
            SendResult::Failed { reason } => write!(f, "❌ Failed to send email: {}", reason),
        }
    }
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> SendResult;
}

/// Base64url form expected in the `raw` field of the send call
pub fn encode_raw(wire_bytes: &[u8]) -> String {
    general_purpose::URL_SAFE.encode(wire_bytes)
}

#[derive(Deserialize)]
struct SentMessage {
    #[serde(default)]
    id: Option<String>,
}

pub struct GmailClient {
    http: reqwest::Client,
    send_url: String,
    authorizer: Arc<dyn Authorizer>,
}

impl GmailClient {
    pub fn new(config: &GmailConfig, authorizer: Arc<dyn Authorizer>) -> Self {
        let send_url = format!(
            "{}/gmail/v1/users/me/messages/send",
            config.api_base_url.trim_end_matches('/')
        );

        GmailClient {
            http: reqwest::Client::new(),
            send_url,
            authorizer,
        }
    }

    /// Submit a message as the authenticated user and return its Gmail id
    pub async fn send_message(&self, message: &OutboundMessage) -> Result<String, SendError> {
        let client = self.authorizer.authorize().await?;

        let wire_bytes = message.to_wire_bytes()?;
        debug!("Message serialized, size: {} bytes", wire_bytes.len());

        let response = self
            .http
            .post(&self.send_url)
            .bearer_auth(client.access_token())
            .json(&serde_json::json!({ "raw": encode_raw(&wire_bytes) }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let sent: SentMessage = response.json().await?;
        Ok(sent.id.unwrap_or_default())
    }
}

#[async_trait]
impl MailSender for GmailClient {
    async fn send(&self, message: OutboundMessage) -> SendResult {
        let recipient = message.recipient();
        info!("📤 Sending email to {}", recipient);

        match self.send_message(&message).await {
            Ok(id) => {
                info!("✅ Email sent to {} (id: {})", recipient, id);
                SendResult::Sent { recipient }
            }
            Err(e) => {
                error!("❌ Gmail API send error: {}", e);
                SendResult::failed(e)
            }
        }
    }
}
