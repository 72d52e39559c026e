use std::sync::Arc;

use crate::error::RetrievalError;
use crate::llm::AnswerGenerator;
use crate::models::{
    FusedResult, HybridSearchResponse, RetrieveResponse, SearchRequest, SourceSnippet,
};
use crate::search::hybrid::HybridSearcher;

/// Separator between retrieved documents in the answer context.
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Hybrid retrieval followed by grounded answer generation.
#[derive(Clone)]
pub struct RagPipeline {
    searcher: HybridSearcher,
    generator: Arc<dyn AnswerGenerator>,
}

impl RagPipeline {
    pub fn new(searcher: HybridSearcher, generator: Arc<dyn AnswerGenerator>) -> Self {
        Self {
            searcher,
            generator,
        }
    }

    /// Fusion only, no answer.
    pub async fn retrieve(&self, req: &SearchRequest) -> Result<RetrieveResponse, RetrievalError> {
        let (results, retrieval_stats) = self.searcher.fuse(req).await?;
        Ok(RetrieveResponse {
            sources: results.iter().map(SourceSnippet::from).collect(),
            retrieval_stats,
        })
    }

    /// Retrieve, then answer from the top results.
    ///
    /// A generation failure fails the request; sources are never returned
    /// without an answer.
    pub async fn answer(&self, req: &SearchRequest) -> Result<HybridSearchResponse, RetrievalError> {
        let (results, retrieval_stats) = self.searcher.fuse(req).await?;

        let context = build_context(&results);
        let answer = self
            .generator
            .generate(req.query.trim(), &context)
            .await
            .map_err(RetrievalError::Generation)?;

        Ok(HybridSearchResponse {
            answer,
            sources: results.iter().map(SourceSnippet::from).collect(),
            retrieval_stats,
        })
    }
}

/// Concatenate result contents in rank order.
pub fn build_context(results: &[FusedResult]) -> String {
    results
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
