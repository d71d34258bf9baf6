//! # ToolRAG Core
//!
//! Shared, WASM-safe logic for ToolRAG: tool descriptor models, content
//! hashing, embedding-text formatting, the embedding provider and store
//! traits, and the three algorithms that keep a per-provider embedding
//! namespace consistent with the live tool set:
//!
//! ```text
//!  ToolRegistry ──▶ sync ──▶ Store ◀── prune
//!                              │
//!                              ▼
//!                          retrieve ──▶ FunctionTool[]
//! ```
//!
//! This crate contains no tokio, sqlx, HTTP client or filesystem I/O.
//! Concrete providers and the SQLite store live in the `toolrag` app crate.

pub mod embedding;
pub mod error;
pub mod hash;
pub mod index;
pub mod models;
pub mod prune;
pub mod registry;
pub mod retrieve;
pub mod store;
pub mod sync;
pub mod text;

#[cfg(test)]
mod test_support;

pub use error::{Result, ToolRagError};
pub use index::ToolIndex;
pub use models::{FunctionTool, RetrievalResult, ToolDescriptor};
pub use registry::ToolRegistry;
