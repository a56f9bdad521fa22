//! # spendlens
//!
//! A session-scoped bill ingestion, semantic retrieval, and spending
//! analytics service.
//!
//! spendlens ingests scanned/printed financial documents (receipts,
//! bills) into isolated per-user sessions, extracts structured bill
//! records, indexes their text for semantic retrieval, answers
//! natural-language questions grounded in the session's documents, and
//! computes aggregate spending analytics.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────────────────┐   ┌───────────────┐
//! │  Upload   │──▶│  Extract → Record →     │──▶│  Session      │
//! │ (pdf/txt/ │   │  Chunk → Embed          │   │  bills+index  │
//! │  images)  │   └─────────────────────────┘   └──────┬────────┘
//! └──────────┘                                         │
//!                            ┌─────────────┬───────────┤
//!                            ▼             ▼           ▼
//!                      ┌──────────┐ ┌───────────┐ ┌──────────┐
//!                      │  Search   │ │   Chat    │ │ Analysis │
//!                      │ (cosine)  │ │ (grounded)│ │ (totals) │
//!                      └──────────┘ └───────────┘ └──────────┘
//! ```
//!
//! Sessions are in-memory and live from creation until explicit
//! deletion. The embedding and generation capabilities are external,
//! reached through the [`embedding::Embedder`] and [`llm::Generator`]
//! traits; text extraction sits behind [`extract::TextExtractor`].
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy with stable wire codes |
//! | [`extract`] | Text extraction capability and mime admission |
//! | [`record`] | Heuristic bill-record extraction |
//! | [`classify`] | Rule-based categorization |
//! | [`chunk`] | Text chunking |
//! | [`embedding`] | Embedding capability |
//! | [`llm`] | Generation capability |
//! | [`index`] | Per-session vector index |
//! | [`session`] | Session store and lifecycle |
//! | [`ingest`] | Upload pipeline |
//! | [`retrieve`] | Retrieval engine |
//! | [`analysis`] | Spending analytics |
//! | [`chat`] | Grounded chat orchestration |
//! | [`server`] | JSON HTTP API |

pub mod analysis;
pub mod chat;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod record;
pub mod retrieve;
pub mod server;
pub mod session;
