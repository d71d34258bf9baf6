//! Vertex AI text-embedding provider.
//!
//! Calls the REST `:predict` endpoint of a Google publisher model:
//!
//! ```text
//! POST https://{location}-aiplatform.googleapis.com/v1/projects/{project}
//!      /locations/{location}/publishers/google/models/{model}:predict
//! ```
//!
//! The project comes from `embedding.project` or `GOOGLE_CLOUD_PROJECT`.
//! Requests authenticate with the OAuth access token in
//! `GOOGLE_CLOUD_ACCESS_TOKEN` (e.g. from `gcloud auth print-access-token`),
//! read on every call so a refreshed token is picked up.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{check_dims, http_client, parse_vector, send_with_retry, EmbeddingProvider};
use crate::config::EmbeddingConfig;

const TOKEN_ENV: &str = "GOOGLE_CLOUD_ACCESS_TOKEN";

pub struct GoogleProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dims: usize,
    task_type: String,
    max_retries: u32,
}

impl GoogleProvider {
    pub const DEFAULT_MODEL: &'static str = "text-embedding-005";
    pub const DEFAULT_DIMS: usize = 768;
    pub const DEFAULT_TASK_TYPE: &'static str = "RETRIEVAL_QUERY";

    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let project = match &config.project {
            Some(p) => p.clone(),
            None => std::env::var("GOOGLE_CLOUD_PROJECT").map_err(|_| {
                anyhow::anyhow!("embedding.project or GOOGLE_CLOUD_PROJECT required for Google provider")
            })?,
        };
        if std::env::var(TOKEN_ENV).is_err() {
            bail!("{} environment variable not set", TOKEN_ENV);
        }

        let model = config
            .model
            .clone()
            .unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());
        let dims = config.dims.unwrap_or(Self::DEFAULT_DIMS);

        Ok(Self {
            client: http_client(config)?,
            endpoint: predict_endpoint(&project, &config.location, &model),
            model,
            dims,
            task_type: Self::DEFAULT_TASK_TYPE.to_string(),
            max_retries: config.max_retries,
        })
    }
}

fn predict_endpoint(project: &str, location: &str, model: &str) -> String {
    format!(
        "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:predict"
    )
}

#[async_trait]
impl EmbeddingProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let token = std::env::var(TOKEN_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", TOKEN_ENV))?;
        let body = serde_json::json!({
            "instances": [{ "content": text, "task_type": self.task_type }],
            "parameters": { "outputDimensionality": self.dims },
        });

        let json = send_with_retry(
            || {
                self.client
                    .post(&self.endpoint)
                    .bearer_auth(&token)
                    .json(&body)
            },
            self.max_retries,
            "Vertex AI",
        )
        .await?;

        check_dims(parse_predict_response(&json)?, self.dims, "Vertex AI")
    }
}

/// Extract `predictions[0].embeddings.values`.
fn parse_predict_response(json: &Value) -> Result<Vec<f32>> {
    let values = json
        .get("predictions")
        .and_then(|p| p.as_array())
        .and_then(|p| p.first())
        .and_then(|p| p.get("embeddings"))
        .and_then(|e| e.get("values"))
        .ok_or_else(|| anyhow::anyhow!("Invalid Vertex AI response: missing predictions[0].embeddings.values"))?;
    parse_vector(values, "Vertex AI")
}
