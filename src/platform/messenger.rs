use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::{Attachment, AttachmentKind, IncomingMessage, MessageSender, OutgoingMessage};
use crate::config::MessengerConfig;
use crate::relay::Relay;

const PLATFORM: &str = "messenger";

// ── Webhook payload ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: Participant,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub mid: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<EventAttachment>,
    #[serde(default)]
    pub is_echo: bool,
}

#[derive(Debug, Deserialize)]
pub struct EventAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<AttachmentPayload>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Turn a page webhook payload into platform-agnostic messages.
///
/// Echoes of the page's own messages and non-message events (deliveries,
/// reads, postbacks) are skipped. Attachments without a URL are dropped.
pub fn extract_messages(payload: WebhookPayload) -> Vec<IncomingMessage> {
    if payload.object != "page" {
        debug!("Ignoring webhook object '{}'", payload.object);
        return Vec::new();
    }

    payload
        .entry
        .into_iter()
        .flat_map(|entry| entry.messaging)
        .filter_map(|event| {
            let message = event.message?;
            if message.is_echo {
                return None;
            }
            let attachments = message
                .attachments
                .into_iter()
                .filter_map(|a| {
                    let url = a.payload?.url?;
                    Some(Attachment {
                        kind: AttachmentKind::from_type(&a.kind),
                        url,
                    })
                })
                .collect();

            Some(IncomingMessage {
                platform: PLATFORM.to_string(),
                user_id: event.sender.id.clone(),
                chat_id: event.sender.id,
                message_id: message.mid,
                text: message.text,
                attachments,
            })
        })
        .collect()
}

/// The subscription handshake: echo the challenge when the token matches.
pub fn verify_subscription(params: &VerifyParams, expected_token: &str) -> Option<String> {
    match (&params.mode, &params.verify_token, &params.challenge) {
        (Some(mode), Some(token), Some(challenge))
            if mode == "subscribe" && token == expected_token =>
        {
            Some(challenge.clone())
        }
        _ => None,
    }
}

// ── Send API ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct SendRequest {
    recipient: Recipient,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_action: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Recipient {
    id: String,
}

fn message_body(message: OutgoingMessage) -> Value {
    match message {
        OutgoingMessage::Text(text) => json!({ "text": text }),
        OutgoingMessage::Files(urls) => {
            let attachments: Vec<Value> = urls
                .into_iter()
                .map(|url| json!({ "type": "image", "payload": { "url": url, "is_reusable": true } }))
                .collect();
            json!({ "attachments": attachments })
        }
    }
}

/// Delivers replies through the Graph Send API.
pub struct MessengerSender {
    client: reqwest::Client,
    config: MessengerConfig,
}

impl MessengerSender {
    /// Every Send API call is bounded by `timeout`: replies go out while the
    /// user's session is locked.
    pub fn new(config: MessengerConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Send API client")?;
        Ok(Self { client, config })
    }

    async fn post(&self, request: &SendRequest) -> Result<()> {
        let url = format!("{}/me/messages", self.config.graph_api_url);

        let response = self
            .client
            .post(&url)
            .query(&[("access_token", &self.config.page_access_token)])
            .json(request)
            .send()
            .await
            .context("Failed to send request to the Send API")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Send API error ({}): {}", status, error_body);
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for MessengerSender {
    async fn send(&self, chat_id: &str, message: OutgoingMessage) -> Result<()> {
        self.post(&SendRequest {
            recipient: Recipient {
                id: chat_id.to_string(),
            },
            message: Some(message_body(message)),
            sender_action: None,
            payload: None,
        })
        .await
    }

    async fn react(&self, chat_id: &str, message_id: &str) -> Result<()> {
        self.post(&SendRequest {
            recipient: Recipient {
                id: chat_id.to_string(),
            },
            message: None,
            sender_action: Some("react"),
            payload: Some(json!({
                "message_id": message_id,
                "reaction": self.config.reaction,
            })),
        })
        .await
    }
}

// ── Server ─────────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct WebhookState {
    relay: Arc<Relay>,
    sender: Arc<MessengerSender>,
    verify_token: Arc<str>,
}

async fn verify(
    State(state): State<WebhookState>,
    Query(params): Query<VerifyParams>,
) -> Result<String, StatusCode> {
    match verify_subscription(&params, &state.verify_token) {
        Some(challenge) => {
            info!("Webhook verified");
            Ok(challenge)
        }
        None => {
            warn!("Webhook verification rejected");
            Err(StatusCode::FORBIDDEN)
        }
    }
}

async fn receive(
    State(state): State<WebhookState>,
    Json(payload): Json<WebhookPayload>,
) -> &'static str {
    for incoming in extract_messages(payload) {
        let relay = state.relay.clone();
        let sender = state.sender.clone();
        // Answer the webhook right away; each event completes on its own task.
        tokio::spawn(async move {
            if let Err(e) = relay.handle(&incoming, sender.as_ref()).await {
                error!("Failed to handle message {}: {:#}", incoming.message_id, e);
            }
        });
    }
    "EVENT_RECEIVED"
}

fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .with_state(state)
}

/// Run the Messenger webhook server
pub async fn run(relay: Arc<Relay>, config: MessengerConfig, timeout: Duration) -> Result<()> {
    let addr = config.socket_addr()?;
    let state = WebhookState {
        relay,
        verify_token: Arc::from(config.verify_token.as_str()),
        sender: Arc::new(MessengerSender::new(config, timeout)?),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Messenger webhook listening on http://{}/webhook", addr);
    axum::serve(listener, router(state))
        .await
        .context("Messenger webhook server failed")?;

    Ok(())
}
