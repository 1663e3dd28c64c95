use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServicesConfig;

/// Source of random cat picture URLs.
#[async_trait]
pub trait CatImageSource: Send + Sync {
    async fn random_image_url(&self) -> Result<String>;
}

/// OCR-style image-to-text service.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Returns the extracted text, empty when the service found none.
    async fn extract_text(&self, image_url: &str) -> Result<String>;
}

/// Conversational / image-understanding API.
#[async_trait]
pub trait ConversationApi: Send + Sync {
    /// Returns the reply text, empty when the service sent none.
    async fn ask(&self, request: &ConversationRequest) -> Result<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Remote session key; the service keeps conversation history under it.
    #[serde(rename = "customId")]
    pub custom_id: String,
}

impl ConversationRequest {
    pub fn prompt(custom_id: &str, prompt: &str) -> Self {
        Self {
            prompt: Some(prompt.to_string()),
            link: None,
            custom_id: custom_id.to_string(),
        }
    }

    pub fn image(custom_id: &str, link: &str, prompt: Option<&str>) -> Self {
        Self {
            prompt: prompt.map(str::to_string),
            link: Some(link.to_string()),
            custom_id: custom_id.to_string(),
        }
    }
}

/// The set of remote services the relay talks to.
#[derive(Clone)]
pub struct Services {
    pub cats: Arc<dyn CatImageSource>,
    pub ocr: Arc<dyn TextExtractor>,
    pub conversation: Arc<dyn ConversationApi>,
}

impl Services {
    /// HTTP-backed services sharing one client.
    pub fn from_config(config: &ServicesConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            cats: Arc::new(CatApiClient {
                client: client.clone(),
                url: config.cat_api_url.clone(),
            }),
            ocr: Arc::new(Img2TxtClient {
                client: client.clone(),
                url: config.img2txt_url.clone(),
            }),
            conversation: Arc::new(GeminiClient {
                client,
                url: config.gemini_url.clone(),
            }),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CatImage {
    url: String,
}

#[derive(Debug, Serialize)]
struct Img2TxtRequest<'a> {
    image_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct Img2TxtResponse {
    #[serde(default)]
    extracted_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    message: Option<String>,
}

pub struct CatApiClient {
    client: reqwest::Client,
    url: String,
}

pub struct Img2TxtClient {
    client: reqwest::Client,
    url: String,
}

pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    service: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_body = response.text().await.unwrap_or_default();
        anyhow::bail!("{} API error ({}): {}", service, status, error_body);
    }

    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", service))
}

#[async_trait]
impl CatImageSource for CatApiClient {
    async fn random_image_url(&self) -> Result<String> {
        debug!("Fetching cat image from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to send request to the cat API")?;

        let images: Vec<CatImage> = read_json(response, "Cat").await?;
        images
            .into_iter()
            .next()
            .map(|image| image.url)
            .context("Cat API returned an empty listing")
    }
}

#[async_trait]
impl TextExtractor for Img2TxtClient {
    async fn extract_text(&self, image_url: &str) -> Result<String> {
        debug!("Sending image to img2txt: {}", image_url);

        let response = self
            .client
            .post(&self.url)
            .json(&Img2TxtRequest { image_url })
            .send()
            .await
            .context("Failed to send request to img2txt")?;

        let body: Img2TxtResponse = read_json(response, "img2txt").await?;
        Ok(body.extracted_text.unwrap_or_default())
    }
}

#[async_trait]
impl ConversationApi for GeminiClient {
    async fn ask(&self, request: &ConversationRequest) -> Result<String> {
        debug!(
            "Sending request to Gemini for {} (image: {})",
            request.custom_id,
            request.link.is_some()
        );

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let body: GeminiResponse = read_json(response, "Gemini").await?;
        Ok(body.message.unwrap_or_default())
    }
}
