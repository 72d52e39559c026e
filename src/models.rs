use serde::{Deserialize, Serialize};

/// Caller-supplied key/value data passed through the pipeline untouched.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A candidate returned by one retrieval source.
///
/// `score` is on the source's own scale and only becomes comparable with
/// the other source after per-source normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub score: Option<f32>,
}

/// Coarse relevance label derived from the fused score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    High,
    Medium,
    Low,
}

/// A document after fusion, ready to be handed to the answer generator.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedResult {
    pub id: String,
    pub content: String,
    pub metadata: Metadata,
    pub score: f32,
    pub relevance: Relevance,
}

/// Hybrid search request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k", alias = "top_k")]
    pub top_k: usize,
    #[serde(default = "default_semantic_weight", alias = "semantic_weight")]
    pub semantic_weight: f32,
    #[serde(default = "default_keyword_weight", alias = "keyword_weight")]
    pub keyword_weight: f32,
    #[serde(default)]
    pub filters: Option<Metadata>,
}

fn default_top_k() -> usize {
    5
}

fn default_semantic_weight() -> f32 {
    0.7
}

fn default_keyword_weight() -> f32 {
    0.3
}

impl SearchRequest {
    /// Request with the documented default size and weights.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_top_k(),
            semantic_weight: default_semantic_weight(),
            keyword_weight: default_keyword_weight(),
            filters: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_weights(mut self, semantic: f32, keyword: f32) -> Self {
        self.semantic_weight = semantic;
        self.keyword_weight = keyword;
        self
    }

    pub fn with_filters(mut self, filters: Metadata) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// Counters describing one retrieval + fusion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RetrievalStats {
    pub semantic_results: usize,
    pub keyword_results: usize,
    pub combined_results: usize,
    pub search_time_ms: u64,
}

/// Source reference in a search response
#[derive(Debug, Clone, Serialize)]
pub struct SourceSnippet {
    pub id: String,
    pub content: String,
    pub score: f32,
    pub relevance: Relevance,
}

impl From<&FusedResult> for SourceSnippet {
    fn from(result: &FusedResult) -> Self {
        Self {
            id: result.id.clone(),
            content: result.content.clone(),
            score: result.score,
            relevance: result.relevance,
        }
    }
}

/// Retrieval-only response (no answer generation)
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResponse {
    pub sources: Vec<SourceSnippet>,
    pub retrieval_stats: RetrievalStats,
}

/// Full hybrid-search RAG response
#[derive(Debug, Clone, Serialize)]
pub struct HybridSearchResponse {
    pub answer: String,
    pub sources: Vec<SourceSnippet>,
    pub retrieval_stats: RetrievalStats,
}

/// A document submitted for indexing
#[derive(Debug, Clone, Deserialize)]
pub struct NewDocument {
    /// Generated when absent
    pub id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

/// Ingest request
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    pub documents: Vec<NewDocument>,
}

/// Ingest response
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub indexed: usize,
    pub ids: Vec<String>,
}
