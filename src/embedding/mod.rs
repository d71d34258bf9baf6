//! Embedding provider implementations and the registry that builds them.
//!
//! The [`EmbeddingProvider`] trait lives in `toolrag-core`; this module holds
//! the concrete backends:
//! - **[`OpenAIProvider`]**: `POST /v1/embeddings`.
//! - **[`GoogleProvider`]**: Vertex AI `:predict` on a text-embedding model.
//! - **[`OllamaProvider`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalProvider`**: fastembed, behind `local-embeddings-fastembed`.
//!
//! # Provider Selection
//!
//! [`ProviderRegistry`] maps provider ids to constructors. [`create_provider`]
//! uses the built-in set; embedders register their own ids with
//! [`ProviderRegistry::register`].
//!
//! ```rust,no_run
//! # use toolrag::config::EmbeddingConfig;
//! # use toolrag::embedding::ProviderRegistry;
//! let config = EmbeddingConfig {
//!     provider: "ollama".to_string(),
//!     model: Some("nomic-embed-text".to_string()),
//!     dims: Some(768),
//!     ..Default::default()
//! };
//! let provider = ProviderRegistry::with_defaults().create(&config).unwrap();
//! assert_eq!(provider.dims(), 768);
//! ```
//!
//! # Retry Strategy
//!
//! Sync and retrieval never retry. HTTP providers retry transport failures
//! only when `embedding.max_retries > 0`:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod google;
#[cfg(feature = "local-embeddings-fastembed")]
mod local;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

pub use google::GoogleProvider;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalProvider;
pub use toolrag_core::embedding::EmbeddingProvider;

use crate::config::EmbeddingConfig;

type Constructor = Box<dyn Fn(&EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync>;

/// Maps provider ids (`embedding.provider`) to constructors.
pub struct ProviderRegistry {
    constructors: BTreeMap<String, Constructor>,
}

impl ProviderRegistry {
    /// A registry with no providers.
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// The built-in providers: `openai`, `google`, `ollama` and `local`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register("openai", |c| Ok(Arc::new(OpenAIProvider::new(c)?)));
        registry.register("google", |c| Ok(Arc::new(GoogleProvider::new(c)?)));
        registry.register("ollama", |c| Ok(Arc::new(OllamaProvider::new(c)?)));
        registry.register("local", local_provider);
        registry
    }

    /// Add or replace the constructor for `id`.
    pub fn register<F>(&mut self, id: &str, constructor: F)
    where
        F: Fn(&EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        self.constructors.insert(id.to_string(), Box::new(constructor));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.constructors.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    /// Build the provider named by `config.provider`.
    pub fn create(&self, config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        let constructor = self.constructors.get(&config.provider).ok_or_else(|| {
            anyhow::Error::new(toolrag_core::ToolRagError::Configuration(format!(
                "Unknown embedding provider: '{}'. Must be one of: {}.",
                config.provider,
                self.ids().collect::<Vec<_>>().join(", ")
            )))
        })?;
        let provider = constructor(config).with_context(|| {
            format!("Failed to initialize embedding provider '{}'", config.provider)
        })?;
        tracing::debug!(
            provider = provider.name(),
            model = provider.model_id(),
            dims = provider.dims(),
            "embedding provider ready"
        );
        Ok(provider)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Create the provider for `config` from the built-in set.
pub fn create_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    ProviderRegistry::with_defaults().create(config)
}

#[cfg(feature = "local-embeddings-fastembed")]
fn local_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    Ok(Arc::new(LocalProvider::new(config)?))
}

#[cfg(not(feature = "local-embeddings-fastembed"))]
fn local_provider(_config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    bail!("Local embedding provider requires --features local-embeddings-fastembed")
}

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

/// Send a JSON request, retrying 429/5xx and network errors up to
/// `max_retries` times with exponential backoff.
async fn send_with_retry(
    request: impl Fn() -> reqwest::RequestBuilder,
    max_retries: u32,
    service: &str,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(service, attempt, delay_secs = delay.as_secs(), "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        match request().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("{} returned a non-JSON body", service));
                }

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!("{} API error {}: {}", service, status, body_text));
                    continue;
                }

                // Client error other than 429: fail now
                let body_text = response.text().await.unwrap_or_default();
                bail!("{} API error {}: {}", service, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::Error::new(e).context(format!("{} request failed", service)));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("{} embedding failed after retries", service)))
}

/// Read a JSON array of numbers as a vector.
fn parse_vector(values: &Value, service: &str) -> Result<Vec<f32>> {
    values
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("Invalid {} response: embedding is not an array", service))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| anyhow::anyhow!("Invalid {} response: non-numeric component", service))
        })
        .collect()
}

/// Reject vectors whose length differs from the declared dimension.
pub(crate) fn check_dims(vector: Vec<f32>, dims: usize, service: &str) -> Result<Vec<f32>> {
    if vector.len() != dims {
        bail!(
            "Malformed {} response: got {} dimensions, expected {}",
            service,
            vector.len(),
            dims
        );
    }
    Ok(vector)
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API.
///
/// Calls `POST /v1/embeddings` with the configured model. Requires the
/// `OPENAI_API_KEY` environment variable.
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAIProvider {
    pub const DEFAULT_MODEL: &'static str = "text-embedding-3-large";

    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());
        let dims = match (config.dims, model.as_str()) {
            (Some(d), _) => d,
            (None, "text-embedding-3-large") => 3072,
            (None, "text-embedding-3-small" | "text-embedding-ada-002") => 1536,
            (None, other) => bail!("embedding.dims required for OpenAI model '{}'", other),
        };

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            client: http_client(config)?,
            api_key,
            model,
            dims,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        // Only the v3 models accept a reduced output size.
        if self.model.starts_with("text-embedding-3") {
            body["dimensions"] = self.dims.into();
        }

        let json = send_with_retry(
            || {
                self.client
                    .post("https://api.openai.com/v1/embeddings")
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            self.max_retries,
            "OpenAI",
        )
        .await?;

        check_dims(parse_openai_response(&json)?, self.dims, "OpenAI")
    }
}

/// Extract `data[0].embedding` from an OpenAI embeddings response.
fn parse_openai_response(json: &Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data[0].embedding"))?;
    parse_vector(embedding, "OpenAI")
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default:
/// `http://localhost:11434`). Requires the model to be pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            client: http_client(config)?,
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });
        let endpoint = format!("{}/api/embed", self.url);

        let json = send_with_retry(
            || self.client.post(&endpoint).json(&body),
            self.max_retries,
            "Ollama",
        )
        .await
        .with_context(|| format!("is Ollama running at {}?", self.url))?;

        check_dims(parse_ollama_response(&json)?, self.dims, "Ollama")
    }
}

fn parse_ollama_response(json: &Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;
    parse_vector(embedding, "Ollama")
}
