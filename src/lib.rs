//! # Postmind
//!
//! A retrieval-augmented answering service over a social post feed.
//!
//! Postmind ingests posts from a remote JSON feed, embeds them, stores
//! vectors alongside the documents in SQLite, and answers questions by
//! retrieving the most similar posts and grounding a text-generation
//! call on them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────────┐   ┌───────────┐
//! │ Feed     │──▶│ Sync pipeline        │──▶│  SQLite   │
//! │ (JSON)   │   │ detect+embed+upsert  │   │ docs+vecs │
//! └──────────┘   └──────────────────────┘   └─────┬─────┘
//!                                                 │
//!                          ┌──────────────────────┤
//!                          ▼                      ▼
//!                    ┌──────────┐          ┌────────────┐
//!                    │   CLI    │          │ HTTP agent │
//!                    │          │          │ /api/agent │
//!                    └──────────┘          └─────┬──────┘
//!                                                ▼
//!                                     ┌────────────────────┐
//!                                     │ LLM dispatch       │
//!                                     │ openai/gemini/qwen │
//!                                     └────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`source`] | Remote feed client and normalization |
//! | [`detect`] | Change detection between snapshots |
//! | [`sync`] | Sync pipeline orchestration |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`search`] | Vector retrieval |
//! | [`llm`] | Generation provider dispatch |
//! | [`answer`] | Answer orchestration and prompt composition |
//! | [`server`] | HTTP API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod answer;
pub mod config;
pub mod db;
pub mod detect;
pub mod embedding;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
pub mod source;
pub mod sync;
