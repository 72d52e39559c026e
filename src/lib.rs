//! # hybrid-rag
//!
//! Retrieval-augmented generation over a hybrid retriever: a semantic
//! (vector) ranking and a keyword (BM25) ranking are fused into one list
//! whose contents ground an LLM answer.
//!
//! ## Architecture
//!
//! ```text
//!                          ┌─────────────┐
//!                          │ SearchRequest│
//!                          └──────┬───────┘
//!                                 │ validate (query, topK, weights)
//!                    ┌────────────┴────────────┐
//!                    ▼                         ▼
//!           ┌────────────────┐       ┌─────────────────┐
//!           │ embed + vector │       │  keyword (BM25)  │
//!           │  top 2×K        │       │   top 2×K        │
//!           └───────┬────────┘       └────────┬────────┘
//!                   │   join both, timeout each │
//!                   └────────────┬────────────┘
//!                                ▼
//!                  ┌───────────────────────┐
//!                  │ Per-source max norm   │
//!                  │ score / max(1, max)   │
//!                  └───────────┬───────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │ Weighted sum by id    │
//!                  │ 0.7·sem + 0.3·kw      │
//!                  │ sort, keep top K      │
//!                  └───────────┬───────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │ Relevance tiers       │
//!                  │ ≥0.7 high, ≥0.4 medium│
//!                  └───────────┬───────────┘
//!                              ▼
//!                  ┌───────────────────────┐
//!                  │ Answer generation     │
//!                  └───────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for server, data dir, LLM and search limits
//! - [`models`] - Request/response types, `RetrievedDocument`, `FusedResult`, `RetrievalStats`
//! - [`error`] - `RetrievalError`, the failure type of retrieval and RAG requests
//! - [`search::hybrid`] - Score normalization, weighted fusion and the `HybridSearcher`
//! - [`search::vector`] - In-memory cosine-similarity store with disk persistence
//! - [`search::bm25`] - BM25 full-text index powered by tantivy
//! - [`search::filter`] - Metadata filter matching shared by both indexes
//! - [`llm::embeddings`] - Embedding generation via Ollama or OpenAI-compatible APIs
//! - [`llm::answer`] - Grounded answer generation
//! - [`pipeline`] - Retrieval followed by answer generation
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state wiring the default backends

pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod state;
