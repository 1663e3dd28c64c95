use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};

use super::{strip_command_word, Command, CommandContext, CommandInfo};
use crate::messages;

const INFO: CommandInfo = CommandInfo {
    name: "img",
    description: "Send an image URL to get the text it contains.",
    usage: "Send 'img <image URL>' to get the extracted text.",
    sticky: true,
};

/// The image URL in `text`, with an optional leading `img` word removed.
fn image_url(text: &str) -> &str {
    let text = text.trim();
    strip_command_word(text, INFO.name).unwrap_or(text).trim()
}

/// Relays an image URL to the image-to-text service.
pub struct ImgCommand;

impl ImgCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImgCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command for ImgCommand {
    fn info(&self) -> &CommandInfo {
        &INFO
    }

    async fn run(&self, ctx: &CommandContext<'_>, text: &str) -> Result<()> {
        let url = image_url(text);
        if url.is_empty() {
            return ctx.reply(messages::IMG_MISSING_URL).await;
        }

        info!("Extracting text from {} for {}", url, ctx.user_id);
        ctx.reply(messages::IMG_RECEIVED).await?;

        let extracted = match ctx.services.ocr.extract_text(url).await {
            Ok(text) => text,
            Err(e) => {
                error!("img2txt call failed: {:#}", e);
                return ctx.reply(messages::IMG_FAILED).await;
            }
        };

        tokio::time::sleep(ctx.settings.ocr_delay()).await;

        let extracted = extracted.trim();
        if extracted.is_empty() {
            ctx.reply(messages::IMG_NO_TEXT).await
        } else {
            ctx.reply(messages::img_extracted(extracted)).await
        }
    }
}
