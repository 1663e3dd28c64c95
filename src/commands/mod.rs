pub mod cat;
pub mod img;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::RelayConfig;
use crate::platform::{MessageSender, OutgoingMessage};
use crate::services::Services;

/// Static metadata of a command
#[derive(Debug, Clone)]
pub struct CommandInfo {
    /// Lowercase name, also the text prefix that triggers the command
    pub name: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    /// Sticky commands stay active for the user until "stop".
    pub sticky: bool,
}

/// Everything a command needs to answer one message.
pub struct CommandContext<'a> {
    pub user_id: &'a str,
    pub chat_id: &'a str,
    pub sender: &'a dyn MessageSender,
    pub services: &'a Services,
    pub settings: &'a RelayConfig,
}

impl CommandContext<'_> {
    pub async fn reply(&self, text: impl Into<String>) -> Result<()> {
        self.sender
            .send(self.chat_id, OutgoingMessage::Text(text.into()))
            .await
    }

    pub async fn reply_files(&self, urls: Vec<String>) -> Result<()> {
        self.sender
            .send(self.chat_id, OutgoingMessage::Files(urls))
            .await
    }
}

/// A chat command.
///
/// Remote-service failures are reported to the user inside `run`; an `Err`
/// means a reply could not be delivered.
#[async_trait]
pub trait Command: Send + Sync {
    fn info(&self) -> &CommandInfo;

    async fn run(&self, ctx: &CommandContext<'_>, text: &str) -> Result<()>;
}

/// Ordered registry of commands.
///
/// Names are kept longest first, so when one name is a prefix of another the
/// longer one wins.
pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// The built-in command set.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(cat::CatCommand::new()))?;
        registry.register(Arc::new(img::ImgCommand::new()))?;
        Ok(registry)
    }

    pub fn register(&mut self, command: Arc<dyn Command>) -> Result<()> {
        let info = command.info();
        if info.name.is_empty() {
            anyhow::bail!("Command name must not be empty");
        }
        if info.name.chars().any(|c| !c.is_ascii() || c.is_ascii_uppercase()) {
            anyhow::bail!("Command name must be lowercase ASCII: {}", info.name);
        }
        if self.get(info.name).is_some() {
            anyhow::bail!("Duplicate command name: {}", info.name);
        }

        info!("Registered command: {} ({})", info.name, info.description);
        debug!("  usage: {}", info.usage);
        let position = self
            .commands
            .iter()
            .position(|existing| existing.info().name.len() < info.name.len())
            .unwrap_or(self.commands.len());
        self.commands.insert(position, command);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Command>> {
        self.commands.iter().find(|c| c.info().name == name)
    }

    /// Find the command whose name starts `text` and return it with the
    /// trimmed remainder.
    pub fn match_prefix<'t>(&self, text: &'t str) -> Option<(&Arc<dyn Command>, &'t str)> {
        let text = text.trim();
        self.commands.iter().find_map(|command| {
            strip_prefix_ignore_case(text, command.info().name)
                .map(|rest| (command, rest.trim()))
        })
    }

    pub fn list(&self) -> impl Iterator<Item = &CommandInfo> {
        self.commands.iter().map(|c| c.info())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `text` without a leading `prefix`, compared ASCII case-insensitively.
pub fn strip_prefix_ignore_case<'t>(text: &'t str, prefix: &str) -> Option<&'t str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

/// Like [`strip_prefix_ignore_case`], but the prefix must be a whole word:
/// followed by whitespace or the end of the text.
pub fn strip_command_word<'t>(text: &'t str, word: &str) -> Option<&'t str> {
    let rest = strip_prefix_ignore_case(text, word)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest.trim_start()),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestCommand;

    #[test]
    fn test_builtin_registry() {
        let registry = CommandRegistry::builtin().unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.get("cat").is_some());
        assert!(registry.get("img").is_some());
        assert!(registry.list().all(|info| info.sticky));
    }

    #[test]
    fn test_match_prefix_returns_remainder() {
        let registry = CommandRegistry::builtin().unwrap();

        let (command, rest) = registry.match_prefix("  CAT 3 ").unwrap();
        assert_eq!(command.info().name, "cat");
        assert_eq!(rest, "3");

        let (command, rest) = registry.match_prefix("img https://x/Pic.PNG").unwrap();
        assert_eq!(command.info().name, "img");
        assert_eq!(rest, "https://x/Pic.PNG");

        assert!(registry.match_prefix("hello there").is_none());
        assert!(registry.match_prefix("").is_none());
    }

    #[test]
    fn test_longest_name_wins_regardless_of_registration_order() {
        for names in [["im", "img"], ["img", "im"]] {
            let mut registry = CommandRegistry::new();
            for name in names {
                registry
                    .register(Arc::new(TestCommand::new(name, true)))
                    .unwrap();
            }

            let (command, rest) = registry.match_prefix("img url").unwrap();
            assert_eq!(command.info().name, "img");
            assert_eq!(rest, "url");

            let (command, rest) = registry.match_prefix("imx").unwrap();
            assert_eq!(command.info().name, "im");
            assert_eq!(rest, "x");
        }
    }

    #[test]
    fn test_register_rejects_bad_names() {
        let mut registry = CommandRegistry::new();
        registry
            .register(Arc::new(TestCommand::new("cat", true)))
            .unwrap();

        assert!(registry
            .register(Arc::new(TestCommand::new("cat", false)))
            .is_err());
        assert!(registry.register(Arc::new(TestCommand::new("", true))).is_err());
        assert!(registry
            .register(Arc::new(TestCommand::new("Cat", true)))
            .is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_strip_prefix_ignore_case() {
        assert_eq!(strip_prefix_ignore_case("Cat 3", "cat"), Some(" 3"));
        assert_eq!(strip_prefix_ignore_case("ca", "cat"), None);
        assert_eq!(strip_prefix_ignore_case("dog", "cat"), None);
        // Must not panic inside a multi-byte character
        assert_eq!(strip_prefix_ignore_case("éa", "ab"), None);
    }

    #[test]
    fn test_strip_command_word() {
        assert_eq!(strip_command_word("cat 5", "cat"), Some("5"));
        assert_eq!(strip_command_word("CAT", "cat"), Some(""));
        assert_eq!(strip_command_word("catalog", "cat"), None);
        assert_eq!(strip_command_word("imgur.com/a.png", "img"), None);
    }
}
