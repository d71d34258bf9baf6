//! Error taxonomy for ToolRAG operations.
//!
//! Every core operation returns [`ToolRagError`]. Nothing is retried or
//! swallowed: a provider failure aborts the whole sync batch (or the single
//! query embedding), a store failure aborts the operation in progress.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolRagError>;

#[derive(Debug, Error)]
pub enum ToolRagError {
    /// Malformed setup input. Fatal at construction.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An operation ran before its store or provider was ready.
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// Embedding call failed (auth, network, malformed response).
    #[error("Embedding provider error: {0:#}")]
    Provider(anyhow::Error),

    /// Persisted store query or write failed.
    #[error("Store error: {0:#}")]
    Store(anyhow::Error),

    /// The configured reranker failed.
    #[error("Reranker error: {0:#}")]
    Rerank(anyhow::Error),

    /// A tool source returned a payload that is not a valid descriptor.
    #[error("Invalid tool descriptor: {0}")]
    InvalidDescriptor(String),
}

impl ToolRagError {
    pub fn provider(err: impl Into<anyhow::Error>) -> Self {
        Self::Provider(err.into())
    }

    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        Self::Store(err.into())
    }
}
