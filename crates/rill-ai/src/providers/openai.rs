//! OpenAI-compatible Chat Completions gateway (OpenRouter by default)

use futures::StreamExt;
use serde::Serialize;

use super::{Gateway, GatewayStream, get_api_key};
use crate::{
    error::{Error, Result},
    types::RequestConfig,
};

/// Default endpoint root
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Environment variable holding the OpenRouter key
pub const OPENROUTER_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const DEFAULT_REFERER: &str = "https://github.com/rill-chat/rill";
const DEFAULT_TITLE: &str = "rill";

/// Streams chat completions from any endpoint speaking the OpenAI wire format
#[derive(Debug, Clone)]
pub struct OpenAiCompatGateway {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    referer: String,
    title: String,
}

impl OpenAiCompatGateway {
    /// Create a gateway with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: Some(api_key.into()),
            base_url: OPENROUTER_BASE_URL.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }

    /// Create a gateway whose key may be missing.
    ///
    /// A missing key is only reported when a stream is opened, so a front end
    /// can start and show the problem on the first turn.
    pub fn with_optional_key(api_key: Option<String>) -> Self {
        Self {
            api_key,
            ..Self::new(String::new())
        }
    }

    /// Create from the `OPENROUTER_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = get_api_key(None, OPENROUTER_API_KEY_ENV)?;
        Ok(Self::new(api_key))
    }

    /// Point the gateway at another OpenAI-compatible endpoint root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the attribution headers sent with every request
    pub fn with_attribution(mut self, referer: impl Into<String>, title: impl Into<String>) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "no API key configured (set {} or add it to the config file)",
                    OPENROUTER_API_KEY_ENV
                ))
            })
    }
}

#[async_trait::async_trait]
impl Gateway for OpenAiCompatGateway {
    async fn open_stream(&self, config: &RequestConfig) -> Result<GatewayStream> {
        let api_key = self.api_key()?;
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(
            model = config.model_id(),
            messages = config.messages().len(),
            "opening completion stream at {}",
            url
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .header("Accept", "text/event-stream")
            .json(&CompletionRequest {
                config,
                stream: true,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    Error::Configuration(e.to_string())
                } else {
                    Error::Connection(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "completion request rejected");
            return Err(Error::gateway(status.as_u16(), body));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::StreamRead(e.to_string())));

        Ok(GatewayStream {
            status: status.as_u16(),
            body: Box::pin(body),
        })
    }
}

// Request types

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    #[serde(flatten)]
    config: &'a RequestConfig,
    stream: bool,
}
