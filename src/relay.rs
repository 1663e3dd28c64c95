use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::commands::{CommandContext, CommandRegistry};
use crate::config::RelayConfig;
use crate::messages;
use crate::platform::{split_into_parts, IncomingMessage, MessageSender, OutgoingMessage};
use crate::services::{ConversationRequest, Services};
use crate::session::{Session, SessionStore};

/// Routes inbound messages to commands, the image branch or the default
/// conversational relay. Platform-agnostic: every reply goes through the
/// `MessageSender` the platform passes in.
pub struct Relay {
    settings: RelayConfig,
    commands: CommandRegistry,
    services: Services,
    sessions: Arc<SessionStore>,
}

impl Relay {
    pub fn new(
        settings: RelayConfig,
        commands: CommandRegistry,
        services: Services,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            settings,
            commands,
            services,
            sessions,
        }
    }

    /// Process one inbound event to completion.
    ///
    /// Remote-service failures are answered with an apology; `Err` only
    /// reports that a reply could not be delivered.
    pub async fn handle(&self, incoming: &IncomingMessage, sender: &dyn MessageSender) -> Result<()> {
        let chat_id = incoming.chat_id.as_str();

        info!(
            "{} message from {}: {:?} ({} attachment(s))",
            incoming.platform,
            incoming.user_id,
            incoming.text,
            incoming.attachments.len()
        );

        if incoming.text.is_some() {
            if let Err(e) = sender.react(chat_id, &incoming.message_id).await {
                warn!("Failed to react to {}: {:#}", incoming.message_id, e);
            }
        }

        sender
            .send(chat_id, OutgoingMessage::Text(self.settings.typing_message.clone()))
            .await?;
        tokio::time::sleep(self.settings.typing_delay()).await;

        let mut session = self.sessions.acquire(&incoming.session_key()).await;

        let text = incoming.text.as_deref();
        if text.is_some_and(|t| t.trim().eq_ignore_ascii_case("stop")) {
            if let Some(previous) = session.deactivate() {
                info!("Deactivated '{}' for {}", previous, incoming.user_id);
            }
            return self.reply_to(sender, chat_id, messages::STOPPED).await;
        }

        if let Some(url) = incoming.first_image() {
            session.remember_image(url);
            return self.describe_image(incoming, url, sender).await;
        }

        let ctx = CommandContext {
            user_id: &incoming.user_id,
            chat_id,
            sender,
            services: &self.services,
            settings: &self.settings,
        };

        if let Some(name) = session.active_command() {
            match self.commands.get(name) {
                Some(command) => {
                    debug!("Continuing '{}' for {}", name, incoming.user_id);
                    return command.run(&ctx, text.unwrap_or("")).await;
                }
                None => {
                    warn!("Active command '{}' is not registered, resetting", name);
                    session.deactivate();
                }
            }
        }

        let Some(text) = text else {
            return self.reply_to(sender, chat_id, messages::UNSUPPORTED_MESSAGE).await;
        };

        if let Some((command, rest)) = self.commands.match_prefix(text) {
            let info = command.info();
            if info.sticky {
                activate(&mut session, info.name, &incoming.user_id);
            }
            return command.run(&ctx, rest).await;
        }

        self.converse(incoming, text, sender).await
    }

    /// Send the image to the conversational API twice: once for a general
    /// description and once with the fixed question.
    async fn describe_image(
        &self,
        incoming: &IncomingMessage,
        url: &str,
        sender: &dyn MessageSender,
    ) -> Result<()> {
        let chat_id = incoming.chat_id.as_str();
        self.reply_to(sender, chat_id, messages::IMAGE_RECEIVED).await?;

        let description = ConversationRequest::image(&incoming.user_id, url, None);
        let reply = match self.services.conversation.ask(&description).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Image description failed: {:#}", e);
                return self.reply_to(sender, chat_id, messages::IMAGE_FAILED).await;
            }
        };
        if reply.is_empty() {
            self.reply_to(sender, chat_id, messages::IMAGE_NO_REPLY).await?;
        } else {
            self.send_parts(sender, chat_id, messages::REPLY_LABEL, &reply)
                .await?;
        }

        let question = ConversationRequest::image(
            &incoming.user_id,
            url,
            Some(self.settings.image_question.as_str()),
        );
        match self.services.conversation.ask(&question).await {
            Ok(answer) => {
                self.send_parts(sender, chat_id, messages::QUESTION_LABEL, &answer)
                    .await
            }
            Err(e) => {
                error!("Image question failed: {:#}", e);
                self.reply_to(sender, chat_id, messages::IMAGE_FAILED).await
            }
        }
    }

    /// Default path: forward the text to the conversational API.
    async fn converse(
        &self,
        incoming: &IncomingMessage,
        text: &str,
        sender: &dyn MessageSender,
    ) -> Result<()> {
        let chat_id = incoming.chat_id.as_str();
        let request = ConversationRequest::prompt(&incoming.user_id, text);

        match self.services.conversation.ask(&request).await {
            Ok(reply) if reply.is_empty() => {
                self.reply_to(sender, chat_id, messages::NO_REPLY).await
            }
            Ok(reply) => {
                self.send_parts(sender, chat_id, messages::REPLY_LABEL, &reply)
                    .await
            }
            Err(e) => {
                error!("Conversation API call failed: {:#}", e);
                self.reply_to(sender, chat_id, messages::RELAY_FAILED).await
            }
        }
    }

    async fn send_parts(
        &self,
        sender: &dyn MessageSender,
        chat_id: &str,
        label: &str,
        text: &str,
    ) -> Result<()> {
        for (i, part) in split_into_parts(text, self.settings.chunk_size)
            .iter()
            .enumerate()
        {
            sender
                .send(
                    chat_id,
                    OutgoingMessage::Text(messages::reply_part(label, i + 1, part)),
                )
                .await?;
        }
        Ok(())
    }

    async fn reply_to(&self, sender: &dyn MessageSender, chat_id: &str, text: &str) -> Result<()> {
        sender
            .send(chat_id, OutgoingMessage::Text(text.to_string()))
            .await
    }
}

fn activate(session: &mut Session, name: &str, user_id: &str) {
    if session.active_command() != Some(name) {
        info!("Activated '{}' for {}", name, user_id);
    }
    session.activate(name);
}
