//! Test doubles for the remote services and the platform sender.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::commands::{Command, CommandContext, CommandInfo};
use crate::config::RelayConfig;
use crate::platform::{MessageSender, OutgoingMessage};
use crate::services::{
    CatImageSource, ConversationApi, ConversationRequest, Services, TextExtractor,
};

pub const USER_ID: &str = "user-1";

/// Relay settings with the artificial delays switched off.
pub fn fast_settings() -> RelayConfig {
    RelayConfig {
        typing_delay_ms: 0,
        ocr_delay_ms: 0,
        ..RelayConfig::default()
    }
}

#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(String, OutgoingMessage)>>,
    reactions: Mutex<Vec<(String, String)>>,
    fail_reactions: AtomicBool,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                OutgoingMessage::Text(text) => Some(text),
                OutgoingMessage::Files(_) => None,
            })
            .collect()
    }

    pub fn files(&self) -> Vec<Vec<String>> {
        self.sent()
            .into_iter()
            .filter_map(|m| match m {
                OutgoingMessage::Files(urls) => Some(urls),
                OutgoingMessage::Text(_) => None,
            })
            .collect()
    }

    pub fn reactions(&self) -> Vec<(String, String)> {
        self.reactions.lock().unwrap().clone()
    }

    pub fn fail_reactions(&self) {
        self.fail_reactions.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
        self.reactions.lock().unwrap().clear();
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, chat_id: &str, message: OutgoingMessage) -> Result<()> {
        self.sent
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message));
        Ok(())
    }

    async fn react(&self, chat_id: &str, message_id: &str) -> Result<()> {
        if self.fail_reactions.load(Ordering::SeqCst) {
            anyhow::bail!("reaction rejected");
        }
        self.reactions
            .lock()
            .unwrap()
            .push((chat_id.to_string(), message_id.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct MockCats {
    calls: AtomicUsize,
    fail_after: Mutex<Option<usize>>,
}

impl MockCats {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Succeed `n` times, then fail.
    pub fn fail_after(&self, n: usize) {
        *self.fail_after.lock().unwrap() = Some(n);
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
        *self.fail_after.lock().unwrap() = None;
    }
}

#[async_trait]
impl CatImageSource for MockCats {
    async fn random_image_url(&self) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(limit) = *self.fail_after.lock().unwrap() {
            if call > limit {
                anyhow::bail!("cat API unavailable");
            }
        }
        Ok(format!("https://cats.test/{call}.jpg"))
    }
}

pub struct MockOcr {
    calls: Mutex<Vec<String>>,
    response: Mutex<String>,
    fail: AtomicBool,
}

impl Default for MockOcr {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            response: Mutex::new("some text".to_string()),
            fail: AtomicBool::new(false),
        }
    }
}

impl MockOcr {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn respond_with(&self, text: &str) {
        *self.response.lock().unwrap() = text.to_string();
    }

    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.calls.lock().unwrap().clear();
        self.fail.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl TextExtractor for MockOcr {
    async fn extract_text(&self, image_url: &str) -> Result<String> {
        self.calls.lock().unwrap().push(image_url.to_string());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("img2txt unavailable");
        }
        Ok(self.response.lock().unwrap().clone())
    }
}

/// Replies are taken from the queue first, then the default reply.
/// `None` in the queue makes that call fail.
pub struct MockConversation {
    requests: Mutex<Vec<ConversationRequest>>,
    queued: Mutex<VecDeque<Option<String>>>,
    default_reply: Mutex<String>,
}

impl Default for MockConversation {
    fn default() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new("hello from the model".to_string()),
        }
    }
}

impl MockConversation {
    pub fn requests(&self) -> Vec<ConversationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn respond_with(&self, reply: &str) {
        *self.default_reply.lock().unwrap() = reply.to_string();
    }

    pub fn queue_reply(&self, reply: &str) {
        self.queued
            .lock()
            .unwrap()
            .push_back(Some(reply.to_string()));
    }

    pub fn queue_failure(&self) {
        self.queued.lock().unwrap().push_back(None);
    }

    pub fn reset(&self) {
        self.requests.lock().unwrap().clear();
        self.queued.lock().unwrap().clear();
    }
}

#[async_trait]
impl ConversationApi for MockConversation {
    async fn ask(&self, request: &ConversationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.queued.lock().unwrap().pop_front();
        match queued {
            Some(Some(reply)) => Ok(reply),
            Some(None) => anyhow::bail!("conversation API unavailable"),
            None => Ok(self.default_reply.lock().unwrap().clone()),
        }
    }
}

/// Mock services plus a recording sender, wired together.
pub struct Harness {
    pub sender: Arc<RecordingSender>,
    pub cats: Arc<MockCats>,
    pub ocr: Arc<MockOcr>,
    pub conversation: Arc<MockConversation>,
    pub services: Services,
    pub settings: RelayConfig,
}

impl Harness {
    pub fn new() -> Self {
        let cats = Arc::new(MockCats::default());
        let ocr = Arc::new(MockOcr::default());
        let conversation = Arc::new(MockConversation::default());
        let services = Services {
            cats: cats.clone(),
            ocr: ocr.clone(),
            conversation: conversation.clone(),
        };

        Self {
            sender: Arc::new(RecordingSender::default()),
            cats,
            ocr,
            conversation,
            services,
            settings: fast_settings(),
        }
    }

    pub fn context(&self) -> CommandContext<'_> {
        CommandContext {
            user_id: USER_ID,
            chat_id: USER_ID,
            sender: self.sender.as_ref(),
            services: &self.services,
            settings: &self.settings,
        }
    }

    pub fn reset(&self) {
        self.sender.clear();
        self.cats.reset();
        self.ocr.reset();
        self.conversation.reset();
    }
}

/// Command that records the text it was given.
pub struct TestCommand {
    info: CommandInfo,
    calls: Mutex<Vec<String>>,
}

impl TestCommand {
    pub fn new(name: &'static str, sticky: bool) -> Self {
        Self {
            info: CommandInfo {
                name,
                description: "test command",
                usage: "test",
                sticky,
            },
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Command for TestCommand {
    fn info(&self) -> &CommandInfo {
        &self.info
    }

    async fn run(&self, ctx: &CommandContext<'_>, text: &str) -> Result<()> {
        self.calls.lock().unwrap().push(text.to_string());
        ctx.reply(format!("{} got: {}", self.info.name, text)).await
    }
}
