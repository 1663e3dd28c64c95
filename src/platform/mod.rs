pub mod messenger;
pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;

/// A message received from any platform
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    /// Platform identifier (e.g., "messenger", "telegram")
    pub platform: String,
    /// Platform-specific user ID as string
    pub user_id: String,
    /// Where replies go. Same as `user_id` on Messenger.
    pub chat_id: String,
    /// Platform message ID, used for the acknowledgment reaction
    pub message_id: String,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
}

impl IncomingMessage {
    /// URL of the first attachment when it is an image.
    pub fn first_image(&self) -> Option<&str> {
        match self.attachments.first() {
            Some(Attachment {
                kind: AttachmentKind::Image,
                url,
            }) => Some(url.as_str()),
            _ => None,
        }
    }

    /// Key under which the sender's session is stored.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.platform, self.user_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentKind {
    Image,
    Audio,
    Video,
    File,
    Other(String),
}

impl AttachmentKind {
    pub fn from_type(kind: &str) -> Self {
        match kind {
            "image" => Self::Image,
            "audio" => Self::Audio,
            "video" => Self::Video,
            "file" => Self::File,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingMessage {
    Text(String),
    Files(Vec<String>),
}

/// Delivery side of a platform.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, chat_id: &str, message: OutgoingMessage) -> Result<()>;

    /// Mark an inbound message as seen with the platform's acknowledgment reaction.
    async fn react(&self, chat_id: &str, message_id: &str) -> Result<()>;
}

/// Split `text` into parts of at most `limit` characters.
///
/// Counts characters rather than bytes so multi-byte text never splits inside
/// a code point and always yields `ceil(chars / limit)` parts.
pub fn split_into_parts(text: &str, limit: usize) -> Vec<String> {
    if text.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == limit {
            parts.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
}
