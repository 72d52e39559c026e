use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Metadata, RetrievedDocument};

pub mod bm25;
pub mod filter;
pub mod hybrid;
pub mod vector;

/// Vector-similarity retrieval over pre-embedded documents.
#[async_trait]
pub trait SemanticSearch: Send + Sync {
    async fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        filters: Option<&Metadata>,
    ) -> Result<Vec<RetrievedDocument>>;
}

/// Lexical retrieval over raw document text.
#[async_trait]
pub trait KeywordSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        top_k: usize,
        filters: Option<&Metadata>,
    ) -> Result<Vec<RetrievedDocument>>;
}
