//! The Gemini client and builder.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::request::{
    Content, ErrorEnvelope, GenerateContentBody, GenerateContentResponse, InlineData,
    ListModelsResponse, Part,
};
use crate::retry::RetryPolicy;

/// Default endpoint of the Gemini REST API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Models tried, in order, when the preferred model is not available.
pub const FALLBACK_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.0-flash", "gemini-1.5-flash"];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const CONTEXT_MARKER: &str = "--- CONTEXT ONLY (Previous Page) ---";
const TARGET_MARKER: &str = "--- TARGET IMAGE (Generate Cards) ---";

/// An image attached to a generation request.
#[derive(Debug, Clone, Copy)]
pub struct ImagePart<'a> {
    /// Raw image bytes.
    pub data: &'a [u8],
    /// MIME type such as `image/png`.
    pub mime_type: &'a str,
}

impl<'a> ImagePart<'a> {
    /// Create an image part.
    pub fn new(data: &'a [u8], mime_type: &'a str) -> Self {
        Self { data, mime_type }
    }
}

/// One generation call: prompt, optional target image, optional context.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    /// Instruction text sent first.
    pub prompt: &'a str,
    /// The image cards are generated from.
    pub image: Option<ImagePart<'a>>,
    /// Summary of the previous page, sent as context only.
    pub context: Option<&'a str>,
    /// Overrides the client's model for this call.
    pub model: Option<&'a str>,
}

impl<'a> GenerateRequest<'a> {
    /// A text-only request.
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            image: None,
            context: None,
            model: None,
        }
    }

    /// Attach the target image.
    pub fn image(mut self, image: ImagePart<'a>) -> Self {
        self.image = Some(image);
        self
    }

    /// Attach previous-page context. Blank context is ignored.
    pub fn context(mut self, context: Option<&'a str>) -> Self {
        self.context = context.filter(|c| !c.trim().is_empty());
        self
    }

    /// Use a specific model for this request.
    pub fn model(mut self, model: &'a str) -> Self {
        self.model = Some(model);
        self
    }

    fn parts(&self) -> Vec<Part<'a>> {
        let mut parts = vec![Part::Text { text: self.prompt }];
        if let Some(context) = self.context {
            parts.push(Part::Text {
                text: CONTEXT_MARKER,
            });
            parts.push(Part::Text { text: context });
        }
        if let Some(image) = self.image {
            parts.push(Part::Text {
                text: TARGET_MARKER,
            });
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type,
                    data: STANDARD.encode(image.data),
                },
            });
        }
        parts
    }
}

/// Client for the Gemini API.
///
/// Cloning is cheap; clones share the connection pool and the model list
/// cache.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
    models: Arc<OnceCell<Vec<String>>>,
}

impl GeminiClient {
    /// Create a client with default settings.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::builder().api_key(api_key).build()
    }

    /// Create a builder for custom client configuration.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The model used when a request does not name one.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// The retry policy applied to transient failures.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Generate text for a request, retrying transient failures per the
    /// client's [`RetryPolicy`].
    pub async fn generate(&self, request: GenerateRequest<'_>) -> Result<String> {
        let model = request.model.unwrap_or(&self.model);
        let body = GenerateContentBody {
            contents: vec![Content {
                role: "user",
                parts: request.parts(),
            }],
        };

        debug!(
            model,
            has_image = request.image.is_some(),
            has_context = request.context.is_some(),
            "Sending generateContent"
        );

        self.retry
            .run("generateContent", || self.generate_once(model, &body))
            .await
    }

    async fn generate_once(&self, model: &str, body: &GenerateContentBody<'_>) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let parsed: GenerateContentResponse = Self::decode(response).await?;
        match parsed.first_text() {
            Some(text) => Ok(text),
            None => match parsed.block_reason() {
                Some(reason) => Err(Error::Blocked(reason)),
                None => Err(Error::EmptyResponse),
            },
        }
    }

    /// List the models that support `generateContent`, without the `models/`
    /// prefix.
    ///
    /// The list is fetched once per client and cached; clones share the cache.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let models = self
            .models
            .get_or_try_init(|| self.retry.run("listModels", || self.fetch_models()))
            .await?;
        Ok(models.clone())
    }

    async fn fetch_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let mut models: Vec<String> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http_client
                .get(&url)
                .header("x-goog-api-key", &self.api_key)
                .query(&[("pageSize", "100")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListModelsResponse = Self::decode(request.send().await?).await?;
            for model in page.models {
                if !model
                    .supported_generation_methods
                    .iter()
                    .any(|m| m == "generateContent")
                {
                    continue;
                }
                let name = model
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&model.name)
                    .to_string();
                if !models.contains(&name) {
                    models.push(name);
                }
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        if models.is_empty() {
            return Err(Error::NoModels);
        }
        info!(count = models.len(), "Discovered generation models");
        Ok(models)
    }

    /// Resolve the model to use: `preferred` if it is available, otherwise the
    /// first available of [`FALLBACK_MODELS`], otherwise the first listed.
    pub async fn choose_model(&self, preferred: Option<&str>) -> Result<String> {
        let available = self.list_models().await?;
        Ok(pick_model(&available, preferred))
    }

    /// The model a batch should use.
    ///
    /// An explicit `requested` model is used as given. Otherwise the
    /// configured model is checked against the listing and replaced by a
    /// fallback when this key cannot use it. A listing failure other than an
    /// authentication error keeps the configured model.
    pub async fn resolve_model(&self, requested: Option<&str>) -> Result<String> {
        if let Some(requested) = requested.map(str::trim).filter(|m| !m.is_empty()) {
            return Ok(requested.strip_prefix("models/").unwrap_or(requested).to_string());
        }
        match self.choose_model(Some(&self.model)).await {
            Ok(model) => {
                if model != self.model {
                    warn!(configured = %self.model, using = %model, "Configured model unavailable, falling back");
                }
                Ok(model)
            }
            Err(e) if e.is_auth() => Err(e),
            Err(e) => {
                warn!(error = %e, model = %self.model, "Could not list models, keeping configured model");
                Ok(self.model.clone())
            }
        }
    }

    /// Send a short text-only request to confirm the key and model work.
    ///
    /// Returns the model's reply.
    pub async fn test_connection(&self) -> Result<String> {
        self.generate(GenerateRequest::new("Hello")).await
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(status_error(status, message))
    }
}

fn status_error(status: StatusCode, message: String) -> Error {
    let code = status.as_u16();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth {
            status: code,
            message,
        },
        StatusCode::TOO_MANY_REQUESTS => Error::RateLimited(message),
        s if s.is_server_error() => Error::Server {
            status: code,
            message,
        },
        _ => Error::BadRequest {
            status: code,
            message,
        },
    }
}

fn pick_model(available: &[String], preferred: Option<&str>) -> String {
    if let Some(preferred) = preferred.map(str::trim).filter(|p| !p.is_empty()) {
        let preferred = preferred.strip_prefix("models/").unwrap_or(preferred);
        if available.iter().any(|m| m == preferred) {
            return preferred.to_string();
        }
    }
    FALLBACK_MODELS
        .iter()
        .find(|f| available.iter().any(|m| m == *f))
        .map(|f| f.to_string())
        .or_else(|| available.first().cloned())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

/// Builder for creating a customized [`GeminiClient`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use ankit_gemini::{GeminiClient, RetryPolicy};
///
/// let client = GeminiClient::builder()
///     .api_key("AIza...")
///     .model("gemini-2.0-flash")
///     .retry(RetryPolicy { max_retries: 2, backoff: Duration::from_millis(500) })
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ClientBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the API base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into().trim().to_string();
        self
    }

    /// Set the default model.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.model = model
            .strip_prefix("models/")
            .map(str::to_string)
            .unwrap_or(model);
        self
    }

    /// Set the request timeout. Defaults to 120 seconds.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = duration;
        self
    }

    /// Set the retry policy for transient failures.
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Build the client.
    pub fn build(self) -> GeminiClient {
        let http_client = Client::builder()
            .timeout(self.timeout)
            .build()
            .expect("Failed to build HTTP client");

        GeminiClient {
            http_client,
            base_url: self.base_url,
            api_key: self.api_key,
            model: self.model,
            retry: self.retry,
            models: Arc::new(OnceCell::new()),
        }
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
