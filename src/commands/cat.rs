use anyhow::Result;
use async_trait::async_trait;
use tracing::{error, info};

use super::{strip_command_word, Command, CommandContext, CommandInfo};
use crate::messages;

const INFO: CommandInfo = CommandInfo {
    name: "cat",
    description: "Ask for cat pictures by sending 'cat <number>' or just a number.",
    usage: "Send 'cat <number>' to get that many cat pictures, or a number alone to ask for more.",
    sticky: true,
};

/// Result of reading the user's text.
#[derive(Debug, PartialEq)]
enum CatRequest {
    Count(u32),
    InvalidCount,
    Unrecognized,
}

/// Parse a positive count, saturating values too large for `u32`.
fn parse_count(token: &str) -> Option<u32> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = token.trim_start_matches('0');
    if digits.is_empty() {
        return None;
    }
    Some(digits.parse().unwrap_or(u32::MAX))
}

fn parse_request(text: &str) -> CatRequest {
    let text = text.trim();

    if let Some(count) = parse_count(text) {
        return CatRequest::Count(count);
    }

    match strip_command_word(text, INFO.name) {
        Some(rest) => {
            let token = rest.split_whitespace().next().unwrap_or("");
            match parse_count(token) {
                Some(count) => CatRequest::Count(count),
                None => CatRequest::InvalidCount,
            }
        }
        None if text.is_empty() => CatRequest::InvalidCount,
        None => CatRequest::Unrecognized,
    }
}

/// Sends batches of random cat pictures.
pub struct CatCommand;

impl CatCommand {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CatCommand {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Command for CatCommand {
    fn info(&self) -> &CommandInfo {
        &INFO
    }

    async fn run(&self, ctx: &CommandContext<'_>, text: &str) -> Result<()> {
        let requested = match parse_request(text) {
            CatRequest::Count(count) => count,
            CatRequest::InvalidCount => return ctx.reply(messages::CAT_INVALID_COUNT).await,
            CatRequest::Unrecognized => return ctx.reply(messages::CAT_USAGE_HINT).await,
        };

        let count = requested.min(ctx.settings.max_cat_images);
        info!(
            "Fetching {} cat image(s) for {} (asked for {})",
            count, ctx.user_id, requested
        );
        ctx.reply(messages::cat_preparing(count)).await?;

        let mut urls = Vec::with_capacity(count as usize);
        for _ in 0..count {
            match ctx.services.cats.random_image_url().await {
                Ok(url) => urls.push(url),
                Err(e) => {
                    error!("Cat API call failed: {:#}", e);
                    return ctx.reply(messages::CAT_FAILED).await;
                }
            }
        }

        ctx.reply_files(urls).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::OutgoingMessage;
    use crate::testing::Harness;

    #[test]
    fn test_parse_request() {
        assert_eq!(parse_request("3"), CatRequest::Count(3));
        assert_eq!(parse_request(" 07 "), CatRequest::Count(7));
        assert_eq!(parse_request("cat 4"), CatRequest::Count(4));
        assert_eq!(parse_request("CAT   12 please"), CatRequest::Count(12));
        assert_eq!(
            parse_request("99999999999999999999"),
            CatRequest::Count(u32::MAX)
        );
        assert_eq!(parse_request(""), CatRequest::InvalidCount);
        assert_eq!(parse_request("cat"), CatRequest::InvalidCount);
        assert_eq!(parse_request("cat zero"), CatRequest::InvalidCount);
        assert_eq!(parse_request("cat 0"), CatRequest::InvalidCount);
        assert_eq!(parse_request("cat -2"), CatRequest::InvalidCount);
        assert_eq!(parse_request("many"), CatRequest::Unrecognized);
        // A bare non-positive number is not a count
        assert_eq!(parse_request("0"), CatRequest::Unrecognized);
        assert_eq!(parse_request("-2"), CatRequest::Unrecognized);
        assert_eq!(parse_request("catalog 3"), CatRequest::Unrecognized);
    }

    #[tokio::test]
    async fn test_fetches_requested_count_and_sends_one_batch() {
        let harness = Harness::new();
        for n in 1..=10u32 {
            harness.reset();
            CatCommand::new()
                .run(&harness.context(), &format!("cat {n}"))
                .await
                .unwrap();

            assert_eq!(harness.cats.calls(), n as usize);
            let files = harness.sender.files();
            assert_eq!(files.len(), 1);
            assert_eq!(files[0].len(), n as usize);
        }
    }

    #[tokio::test]
    async fn test_count_is_clamped() {
        let harness = Harness::new();
        CatCommand::new()
            .run(&harness.context(), "cat 25")
            .await
            .unwrap();

        assert_eq!(harness.cats.calls(), 10);
        assert_eq!(harness.sender.files()[0].len(), 10);
        assert_eq!(harness.sender.texts(), vec![messages::cat_preparing(10)]);
    }

    #[tokio::test]
    async fn test_bare_number_is_clamped_too() {
        let harness = Harness::new();
        CatCommand::new().run(&harness.context(), "40").await.unwrap();
        assert_eq!(harness.cats.calls(), 10);
    }

    #[tokio::test]
    async fn test_invalid_counts_send_one_validation_message() {
        let harness = Harness::new();
        for text in ["", "cat", "cat abc", "cat 0", "cat -1"] {
            harness.reset();
            CatCommand::new().run(&harness.context(), text).await.unwrap();

            assert_eq!(harness.cats.calls(), 0, "{text:?}");
            assert_eq!(
                harness.sender.sent(),
                vec![OutgoingMessage::Text(messages::CAT_INVALID_COUNT.to_string())],
                "{text:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_unrecognized_text_gets_usage_hint() {
        let harness = Harness::new();
        for text in ["how are you?", "0", "-2"] {
            harness.reset();
            CatCommand::new().run(&harness.context(), text).await.unwrap();

            assert_eq!(harness.cats.calls(), 0, "{text:?}");
            assert_eq!(
                harness.sender.texts(),
                vec![messages::CAT_USAGE_HINT],
                "{text:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_failure_discards_partial_results() {
        let harness = Harness::new();
        harness.cats.fail_after(2);

        CatCommand::new()
            .run(&harness.context(), "cat 5")
            .await
            .unwrap();

        assert_eq!(harness.cats.calls(), 3);
        assert!(harness.sender.files().is_empty());
        assert_eq!(
            harness.sender.texts(),
            vec![messages::cat_preparing(5), messages::CAT_FAILED.to_string()]
        );
    }
}
