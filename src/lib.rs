//! # ToolRAG
//!
//! Relevance retrieval over MCP tool descriptors.
//!
//! ToolRAG keeps one embedding per tool, stored in a per-provider namespace
//! in SQLite, and answers "which tools matter for this request?" with a
//! ranked, threshold-filtered list of function-tool definitions ready to hand
//! to an LLM.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │ Tool sources│──▶│ ToolRegistry │──▶│ sync / prune  │
//! │  file / MCP │   └──────────────┘   └──────┬────────┘
//! └─────────────┘                            ▼
//!                    ┌──────────┐      ┌───────────────┐
//!  query ──────────▶ │ retrieve │◀────▶│ SQLite store  │
//!                    └────┬─────┘      └───────────────┘
//!                         ▼
//!                  FunctionTool[]
//! ```
//!
//! Descriptors are hashed canonically; a sync embeds only tools whose hash
//! is not yet stored, and every query prunes tools that no source reports.
//!
//! ## Quick Start
//!
//! ```bash
//! toolrag init                        # create database and namespace
//! toolrag sync                        # embed new or changed tools
//! toolrag search "book a flight"      # ranked tool list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`sqlite_store`] | SQLite [`ToolStore`](toolrag_core::store::ToolStore) |
//! | [`embedding`] | Embedding providers and the provider registry |
//! | [`sources`] | File and MCP tool sources |
//! | [`rag`] | The [`ToolRag`] facade |

pub mod config;
pub mod db;
pub mod embedding;
pub mod rag;
pub mod search;
pub mod sources;
pub mod sqlite_store;
pub mod stats;
pub mod sync_cmd;

pub use rag::ToolRag;
pub use toolrag_core::{FunctionTool, RetrievalResult, ToolDescriptor, ToolRagError};
