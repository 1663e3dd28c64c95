use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, InputMedia, InputMediaPhoto, MessageId, ReactionType};
use tracing::{error, info, warn};

use super::{Attachment, AttachmentKind, IncomingMessage, MessageSender, OutgoingMessage};
use crate::config::TelegramConfig;
use crate::relay::Relay;

const PLATFORM: &str = "telegram";

fn parse_chat_id(chat_id: &str) -> Result<ChatId> {
    chat_id
        .parse::<i64>()
        .map(ChatId)
        .with_context(|| format!("Invalid Telegram chat id: {}", chat_id))
}

fn parse_url(url: &str) -> Result<reqwest::Url> {
    reqwest::Url::parse(url).with_context(|| format!("Invalid file URL: {}", url))
}

fn is_allowed(allowed_user_ids: &[u64], user_id: u64) -> bool {
    allowed_user_ids.is_empty() || allowed_user_ids.contains(&user_id)
}

/// Delivers replies through the Bot API.
pub struct TelegramSender {
    bot: Bot,
    reaction: String,
}

impl TelegramSender {
    pub fn new(bot: Bot, reaction: String) -> Self {
        Self { bot, reaction }
    }
}

#[async_trait]
impl MessageSender for TelegramSender {
    async fn send(&self, chat_id: &str, message: OutgoingMessage) -> Result<()> {
        let chat_id = parse_chat_id(chat_id)?;

        match message {
            OutgoingMessage::Text(text) => {
                self.bot
                    .send_message(chat_id, text)
                    .await
                    .context("Failed to send Telegram message")?;
            }
            OutgoingMessage::Files(urls) => match urls.as_slice() {
                [] => {}
                [url] => {
                    self.bot
                        .send_photo(chat_id, InputFile::url(parse_url(url)?))
                        .await
                        .context("Failed to send Telegram photo")?;
                }
                _ => {
                    let media = urls
                        .iter()
                        .map(|url| {
                            Ok(InputMedia::Photo(InputMediaPhoto::new(InputFile::url(
                                parse_url(url)?,
                            ))))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    self.bot
                        .send_media_group(chat_id, media)
                        .await
                        .context("Failed to send Telegram media group")?;
                }
            },
        }

        Ok(())
    }

    async fn react(&self, chat_id: &str, message_id: &str) -> Result<()> {
        let chat_id = parse_chat_id(chat_id)?;
        let message_id = message_id
            .parse::<i32>()
            .map(MessageId)
            .with_context(|| format!("Invalid Telegram message id: {}", message_id))?;

        self.bot
            .set_message_reaction(chat_id, message_id)
            .reaction(vec![ReactionType::Emoji {
                emoji: self.reaction.clone(),
            }])
            .await
            .context("Failed to set Telegram reaction")?;
        Ok(())
    }
}

/// Run the Telegram bot platform
pub async fn run(relay: Arc<Relay>, config: TelegramConfig) -> Result<()> {
    let bot = Bot::new(&config.bot_token);
    let sender = Arc::new(TelegramSender::new(bot.clone(), config.reaction.clone()));
    let allowed_user_ids = config.allowed_user_ids.clone();
    let config = Arc::new(config);

    info!("Starting Telegram platform...");

    let handler = Update::filter_message()
        .filter_map(move |msg: Message| {
            let user = msg.from.as_ref()?;
            if is_allowed(&allowed_user_ids, user.id.0) {
                Some(msg)
            } else {
                None
            }
        })
        .endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![relay, sender, config])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    relay: Arc<Relay>,
    sender: Arc<TelegramSender>,
    config: Arc<TelegramConfig>,
) -> ResponseResult<()> {
    let user_id = match msg.from.as_ref() {
        Some(user) => user.id.0,
        None => return Ok(()),
    };

    let text = msg.text().or_else(|| msg.caption()).map(str::to_string);

    let mut attachments = Vec::new();
    if let Some(sizes) = msg.photo() {
        if config.forward_photos {
            // Sizes are ordered smallest first
            if let Some(photo) = sizes.last() {
                let file = bot.get_file(photo.file.id.clone()).await?;
                attachments.push(Attachment {
                    kind: AttachmentKind::Image,
                    url: format!(
                        "https://api.telegram.org/file/bot{}/{}",
                        config.bot_token, file.path
                    ),
                });
            }
        } else {
            info!("Photo from {} not forwarded (forward_photos is off)", user_id);
        }
    }

    let incoming = IncomingMessage {
        platform: PLATFORM.to_string(),
        user_id: user_id.to_string(),
        chat_id: msg.chat.id.0.to_string(),
        message_id: msg.id.0.to_string(),
        text,
        attachments,
    };

    if let Err(e) = relay.handle(&incoming, sender.as_ref()).await {
        error!("Error processing message: {:#}", e);
    }

    Ok(())
}
