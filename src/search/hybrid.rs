use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SearchConfig;
use crate::error::{RetrievalError, RetrievalSource};
use crate::llm::Embedder;
use crate::models::{FusedResult, Relevance, RetrievalStats, RetrievedDocument, SearchRequest};
use crate::search::{KeywordSearch, SemanticSearch};

/// Each source is asked for `OVERFETCH_FACTOR × top_k` candidates so the
/// fusion step has room to re-rank.
pub const OVERFETCH_FACTOR: usize = 2;

/// Lower bound of the `high` tier.
///
/// Both thresholds are fixed literals tuned for the default weights
/// (0.7 semantic / 0.3 keyword), where the best possible fused score is 1.0.
/// Weight pairs summing to something else move the score range but not
/// these boundaries.
pub const HIGH_RELEVANCE_THRESHOLD: f32 = 0.7;
/// Lower bound of the `medium` tier.
pub const MEDIUM_RELEVANCE_THRESHOLD: f32 = 0.4;

/// Floor for a source's normalizer; keeps empty or all-zero lists from
/// dividing by zero and small-scale lists from being inflated to 1.0.
const MIN_NORMALIZER: f32 = 1.0;

const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_TOP_K: usize = 100;

pub fn relevance_for_score(score: f32) -> Relevance {
    if score >= HIGH_RELEVANCE_THRESHOLD {
        Relevance::High
    } else if score >= MEDIUM_RELEVANCE_THRESHOLD {
        Relevance::Medium
    } else {
        Relevance::Low
    }
}

fn raw_score(doc: &RetrievedDocument) -> f32 {
    doc.score.unwrap_or(0.0)
}

fn normalizer(docs: &[RetrievedDocument]) -> f32 {
    docs.iter().map(raw_score).fold(MIN_NORMALIZER, f32::max)
}

/// Drop candidates a source should never have produced: empty ids,
/// non-finite scores and repeats of an id already seen earlier in the same
/// list. The rest of the batch is kept in order.
pub fn discard_malformed(
    docs: Vec<RetrievedDocument>,
    leg: RetrievalSource,
) -> Vec<RetrievedDocument> {
    let mut seen = HashSet::with_capacity(docs.len());
    docs.into_iter()
        .filter(|doc| {
            if doc.id.trim().is_empty() {
                tracing::warn!("Dropping {leg} candidate without an id");
                return false;
            }
            if doc.score.is_some_and(|s| !s.is_finite()) {
                tracing::warn!("Dropping {leg} candidate '{}' with non-finite score", doc.id);
                return false;
            }
            if !seen.insert(doc.id.clone()) {
                tracing::warn!("Dropping duplicate {leg} candidate '{}'", doc.id);
                return false;
            }
            true
        })
        .collect()
}

/// Weighted linear fusion of a semantic and a keyword ranking.
///
/// Each list is normalized by its own maximum score (floored at 1.0), scaled
/// by its weight, and summed per document id. Content and metadata come from
/// whichever list introduced the id first, semantic before keyword. The
/// returned documents carry the fused score and are sorted by it descending;
/// ties keep first-insertion order.
pub fn combine_results(
    semantic: &[RetrievedDocument],
    keyword: &[RetrievedDocument],
    semantic_weight: f32,
    keyword_weight: f32,
) -> Vec<RetrievedDocument> {
    let max_semantic = normalizer(semantic);
    let max_keyword = normalizer(keyword);

    let weighted = semantic
        .iter()
        .map(|doc| (doc, raw_score(doc) / max_semantic * semantic_weight))
        .chain(
            keyword
                .iter()
                .map(|doc| (doc, raw_score(doc) / max_keyword * keyword_weight)),
        );

    let mut combined: Vec<RetrievedDocument> = Vec::with_capacity(semantic.len() + keyword.len());
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(combined.capacity());

    for (doc, contribution) in weighted {
        match positions.get(doc.id.as_str()) {
            Some(&i) => {
                let entry = &mut combined[i];
                entry.score = Some(raw_score(entry) + contribution);
            }
            None => {
                positions.insert(doc.id.as_str(), combined.len());
                combined.push(RetrievedDocument {
                    score: Some(contribution),
                    ..doc.clone()
                });
            }
        }
    }

    // sort_by is stable, so equal scores stay in insertion order
    combined.sort_by(|a, b| {
        raw_score(b)
            .partial_cmp(&raw_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    combined
}

fn into_fused(doc: RetrievedDocument) -> FusedResult {
    let score = raw_score(&doc);
    FusedResult {
        id: doc.id,
        content: doc.content,
        metadata: doc.metadata,
        score,
        relevance: relevance_for_score(score),
    }
}

/// Runs `fut` under `timeout`, attributing any failure to `leg`.
async fn bounded<T, F>(leg: RetrievalSource, timeout: Duration, fut: F) -> Result<T, RetrievalError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(RetrievalError::Upstream { leg, error }),
        Err(_) => Err(RetrievalError::Timeout { leg, timeout }),
    }
}

/// Semantic + keyword retrieval with weighted score fusion.
///
/// Backends are injected, so one searcher can serve any number of concurrent
/// requests; all working state lives inside [`HybridSearcher::fuse`].
#[derive(Clone)]
pub struct HybridSearcher {
    embedder: Arc<dyn Embedder>,
    semantic: Arc<dyn SemanticSearch>,
    keyword: Arc<dyn KeywordSearch>,
    upstream_timeout: Duration,
    max_top_k: usize,
}

impl HybridSearcher {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        semantic: Arc<dyn SemanticSearch>,
        keyword: Arc<dyn KeywordSearch>,
    ) -> Self {
        Self {
            embedder,
            semantic,
            keyword,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            max_top_k: DEFAULT_MAX_TOP_K,
        }
    }

    pub fn with_config(mut self, config: &SearchConfig) -> Self {
        self.upstream_timeout = config.upstream_timeout();
        self.max_top_k = config.max_top_k;
        self
    }

    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout = timeout;
        self
    }

    /// Reject requests the fuser cannot rank meaningfully.
    pub fn validate(&self, req: &SearchRequest) -> Result<(), RetrievalError> {
        if req.query.trim().is_empty() {
            return Err(RetrievalError::invalid("query is required"));
        }
        if req.top_k == 0 {
            return Err(RetrievalError::invalid("topK must be at least 1"));
        }
        if req.top_k > self.max_top_k {
            return Err(RetrievalError::invalid(format!(
                "topK must be at most {}",
                self.max_top_k
            )));
        }
        for (name, weight) in [
            ("semanticWeight", req.semantic_weight),
            ("keywordWeight", req.keyword_weight),
        ] {
            // NaN fails the range check too
            if !(0.0..=1.0).contains(&weight) {
                return Err(RetrievalError::invalid(format!(
                    "{name} must be within [0, 1], got {weight}"
                )));
            }
        }
        Ok(())
    }

    /// Retrieve from both sources concurrently and fuse the rankings.
    ///
    /// Either leg failing or timing out fails the whole call; there is no
    /// single-source fallback.
    pub async fn fuse(
        &self,
        req: &SearchRequest,
    ) -> Result<(Vec<FusedResult>, RetrievalStats), RetrievalError> {
        self.validate(req)?;

        let query = req.query.trim();
        let fetch_k = req.top_k.saturating_mul(OVERFETCH_FACTOR);
        let filters = req.filters.as_ref();

        let started = Instant::now();

        let semantic_leg = async {
            let vector = bounded(
                RetrievalSource::Semantic,
                self.upstream_timeout,
                self.embedder.embed(query),
            )
            .await?;
            bounded(
                RetrievalSource::Semantic,
                self.upstream_timeout,
                self.semantic.search(&vector, fetch_k, filters),
            )
            .await
        };
        let keyword_leg = bounded(
            RetrievalSource::Keyword,
            self.upstream_timeout,
            self.keyword.search(query, fetch_k, filters),
        );

        let (semantic_hits, keyword_hits) = tokio::try_join!(semantic_leg, keyword_leg)?;

        let semantic_hits = discard_malformed(semantic_hits, RetrievalSource::Semantic);
        let keyword_hits = discard_malformed(keyword_hits, RetrievalSource::Keyword);

        let mut combined = combine_results(
            &semantic_hits,
            &keyword_hits,
            req.semantic_weight,
            req.keyword_weight,
        );
        let combined_results = combined.len();
        combined.truncate(req.top_k);

        let stats = RetrievalStats {
            semantic_results: semantic_hits.len(),
            keyword_results: keyword_hits.len(),
            combined_results,
            search_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        tracing::info!(
            "Hybrid search: {} semantic + {} keyword -> {} combined, returning {} in {}ms",
            stats.semantic_results,
            stats.keyword_results,
            stats.combined_results,
            combined.len(),
            stats.search_time_ms
        );

        Ok((combined.into_iter().map(into_fused).collect(), stats))
    }
}
