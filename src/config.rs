use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub messenger: Option<MessengerConfig>,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MessengerConfig {
    pub page_access_token: String,
    pub verify_token: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_graph_api_url")]
    pub graph_api_url: String,
    #[serde(default = "default_messenger_reaction")]
    pub reaction: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Empty means everyone may talk to the bot.
    #[serde(default)]
    pub allowed_user_ids: Vec<u64>,
    #[serde(default = "default_telegram_reaction")]
    pub reaction: String,
    /// Telegram file URLs embed the bot token, so photos are only relayed
    /// to the remote services when this is switched on.
    #[serde(default)]
    pub forward_photos: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServicesConfig {
    #[serde(default = "default_cat_api_url")]
    pub cat_api_url: String,
    #[serde(default = "default_img2txt_url")]
    pub img2txt_url: String,
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_typing_message")]
    pub typing_message: String,
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,
    #[serde(default = "default_ocr_delay_ms")]
    pub ocr_delay_ms: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_cat_images")]
    pub max_cat_images: u32,
    #[serde(default = "default_image_question")]
    pub image_question: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    /// Six-field cron expression (seconds first).
    #[serde(default = "default_sweep_cron")]
    pub sweep_cron: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_graph_api_url() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

fn default_messenger_reaction() -> String {
    "✅".to_string()
}

fn default_telegram_reaction() -> String {
    "👍".to_string()
}

fn default_cat_api_url() -> String {
    "https://api.thecatapi.com/v1/images/search".to_string()
}

fn default_img2txt_url() -> String {
    "https://mon-image-to-txt.onrender.com/img2txt".to_string()
}

fn default_gemini_url() -> String {
    "https://gemini-sary-prompt-espa-vercel-api.vercel.app/api/gemini".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_typing_message() -> String {
    "*Bruno* is writing a reply... one moment, please".to_string()
}

fn default_typing_delay_ms() -> u64 {
    2000
}

fn default_ocr_delay_ms() -> u64 {
    2000
}

fn default_chunk_size() -> usize {
    2000
}

fn default_max_cat_images() -> u32 {
    10
}

fn default_image_question() -> String {
    "What does this image show?".to_string()
}

fn default_idle_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_sweep_cron() -> String {
    "0 */10 * * * *".to_string()
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            cat_api_url: default_cat_api_url(),
            img2txt_url: default_img2txt_url(),
            gemini_url: default_gemini_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            typing_message: default_typing_message(),
            typing_delay_ms: default_typing_delay_ms(),
            ocr_delay_ms: default_ocr_delay_ms(),
            chunk_size: default_chunk_size(),
            max_cat_images: default_max_cat_images(),
            image_question: default_image_question(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl_secs(),
            sweep_cron: default_sweep_cron(),
        }
    }
}

impl RelayConfig {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }

    pub fn ocr_delay(&self) -> Duration {
        Duration::from_millis(self.ocr_delay_ms)
    }
}

impl ServicesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SessionConfig {
    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }
}

impl MessengerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("Invalid messenger listen_addr: {}", self.listen_addr))
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.messenger.is_none() && self.telegram.is_none() {
            anyhow::bail!("No platform configured: add a [messenger] or [telegram] section");
        }
        if self.relay.chunk_size == 0 {
            anyhow::bail!("relay.chunk_size must be greater than zero");
        }
        if self.relay.max_cat_images == 0 {
            anyhow::bail!("relay.max_cat_images must be greater than zero");
        }
        if let Some(messenger) = &self.messenger {
            messenger.socket_addr()?;
        }
        Ok(())
    }
}
