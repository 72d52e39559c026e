//! Integration tests for the hybrid RAG pipeline.
//!
//! These run the real BM25 and vector indexes on disk, with a vocabulary
//! embedder and a recording answer generator standing in for the LLM.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;

use hybrid_rag::error::RetrievalError;
use hybrid_rag::llm::{AnswerGenerator, Embedder};
use hybrid_rag::models::{Metadata, Relevance, RetrievedDocument, SearchRequest};
use hybrid_rag::pipeline::RagPipeline;
use hybrid_rag::search::bm25::Bm25Index;
use hybrid_rag::search::hybrid::HybridSearcher;
use hybrid_rag::search::vector::VectorStore;

const VOCAB: [&str; 10] = [
    "bm25", "ranking", "search", "cosine", "embedding", "vectors", "fusion", "ranked", "tokio",
    "async",
];

/// Bag-of-words over a fixed vocabulary.
struct VocabEmbedder;

impl VocabEmbedder {
    fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let words: Vec<&str> = lower.split_whitespace().collect();
        VOCAB
            .iter()
            .map(|v| words.iter().filter(|w| *w == v).count() as f32)
            .collect()
    }
}

#[async_trait]
impl Embedder for VocabEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(Self::vector(text))
    }
}

#[derive(Default)]
struct RecordingGenerator {
    calls: Mutex<Vec<(String, String)>>,
    fail: bool,
}

#[async_trait]
impl AnswerGenerator for RecordingGenerator {
    async fn generate(&self, query: &str, context: &str) -> anyhow::Result<String> {
        self.calls.lock().push((query.to_string(), context.to_string()));
        if self.fail {
            anyhow::bail!("model unavailable");
        }
        Ok(format!("answer to {query}"))
    }
}

fn corpus() -> Vec<RetrievedDocument> {
    let doc = |id: &str, content: &str, topic: &str| {
        let mut metadata = Metadata::new();
        metadata.insert("topic".into(), json!(topic));
        RetrievedDocument {
            id: id.to_string(),
            content: content.to_string(),
            metadata,
            score: None,
        }
    };
    vec![
        doc("1", "tantivy provides bm25 ranking for full text search", "search"),
        doc("2", "cosine similarity compares embedding vectors", "vectors"),
        doc("3", "reciprocal rank fusion merges ranked lists", "search"),
        doc("4", "tokio runs async tasks on a thread pool", "runtime"),
    ]
}

struct Fixture {
    _bm25_dir: tempfile::TempDir,
    _vec_dir: tempfile::TempDir,
    pipeline: RagPipeline,
    generator: Arc<RecordingGenerator>,
}

fn fixture(generator: RecordingGenerator) -> Fixture {
    let bm25_dir = tempfile::tempdir().unwrap();
    let vec_dir = tempfile::tempdir().unwrap();

    let bm25 = Arc::new(Bm25Index::open_or_create(bm25_dir.path()).unwrap());
    let vectors = Arc::new(VectorStore::open_or_create(vec_dir.path()).unwrap());

    let docs = corpus();
    bm25.index_documents(&docs).unwrap();
    let embeddings = docs.iter().map(|d| VocabEmbedder::vector(&d.content)).collect();
    vectors.add_documents(&docs, embeddings).unwrap();

    let generator = Arc::new(generator);
    let searcher = HybridSearcher::new(Arc::new(VocabEmbedder), vectors, bm25);
    Fixture {
        _bm25_dir: bm25_dir,
        _vec_dir: vec_dir,
        pipeline: RagPipeline::new(searcher, generator.clone()),
        generator,
    }
}

#[tokio::test]
async fn test_end_to_end_answer_over_local_indexes() {
    let fx = fixture(RecordingGenerator::default());
    let req = SearchRequest::new("bm25 ranking search");

    let resp = fx.pipeline.answer(&req).await.unwrap();

    assert_eq!(resp.answer, "answer to bm25 ranking search");
    assert_eq!(resp.sources[0].id, "1");
    assert_eq!(resp.sources[0].relevance, Relevance::High);
    assert!(resp.sources.len() <= 5);
    assert!(resp
        .sources
        .windows(2)
        .all(|w| w[0].score >= w[1].score));

    // Vector store scores every entry; only doc 1 matches lexically
    assert_eq!(resp.retrieval_stats.semantic_results, 4);
    assert_eq!(resp.retrieval_stats.keyword_results, 1);
    assert_eq!(resp.retrieval_stats.combined_results, 4);

    let calls = fx.generator.calls.lock();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1.starts_with("tantivy provides bm25 ranking"));
}

#[tokio::test]
async fn test_filters_restrict_both_sources() {
    let fx = fixture(RecordingGenerator::default());
    let mut filters = Metadata::new();
    filters.insert("topic".into(), json!("search"));
    let req = SearchRequest::new("bm25 ranking search").with_filters(filters);

    let resp = fx.pipeline.retrieve(&req).await.unwrap();

    let ids: Vec<&str> = resp.sources.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
    assert_eq!(resp.retrieval_stats.semantic_results, 2);
    assert_eq!(resp.retrieval_stats.keyword_results, 1);
    assert_eq!(resp.retrieval_stats.combined_results, 2);
}

#[tokio::test]
async fn test_top_k_limits_sources() {
    let fx = fixture(RecordingGenerator::default());
    let req = SearchRequest::new("bm25 ranking search").with_top_k(1);

    let resp = fx.pipeline.retrieve(&req).await.unwrap();
    assert_eq!(resp.sources.len(), 1);
    assert_eq!(resp.sources[0].id, "1");
}

#[tokio::test]
async fn test_invalid_request_never_reaches_generator() {
    let fx = fixture(RecordingGenerator::default());
    let req = SearchRequest::new("bm25").with_weights(0.7, 1.2);

    let err = fx.pipeline.answer(&req).await.unwrap_err();
    assert!(matches!(err, RetrievalError::InvalidRequest(_)));
    assert!(fx.generator.calls.lock().is_empty());
}

#[tokio::test]
async fn test_generation_failure_fails_request() {
    let fx = fixture(RecordingGenerator {
        fail: true,
        ..Default::default()
    });

    let err = fx
        .pipeline
        .answer(&SearchRequest::new("tokio async"))
        .await
        .unwrap_err();
    assert!(matches!(err, RetrievalError::Generation(_)));
    assert!(err.to_string().contains("model unavailable"));
}

#[tokio::test]
async fn test_keyword_weight_zero_ranks_by_semantics_only() {
    let fx = fixture(RecordingGenerator::default());
    let req = SearchRequest::new("cosine embedding vectors").with_weights(1.0, 0.0);

    let resp = fx.pipeline.retrieve(&req).await.unwrap();
    assert_eq!(resp.sources[0].id, "2");
    assert!((resp.sources[0].score - 1.0).abs() < 1e-5);
}
