use std::sync::Arc;

use crate::config::Config;
use crate::llm::answer::LlmAnswerGenerator;
use crate::llm::embeddings::HttpEmbedder;
use crate::pipeline::RagPipeline;
use crate::search::bm25::Bm25Index;
use crate::search::hybrid::HybridSearcher;
use crate::search::vector::VectorStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub bm25: Arc<Bm25Index>,
    pub vectors: Arc<VectorStore>,
    pub http_client: reqwest::Client,
    pub pipeline: RagPipeline,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config.index_dir())?;
        std::fs::create_dir_all(config.vector_dir())?;

        let bm25 = Arc::new(Bm25Index::open_or_create(&config.index_dir())?);
        let vectors = Arc::new(VectorStore::open_or_create_with_limit(
            &config.vector_dir(),
            config.search.max_vector_entries,
        )?);

        let http_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        let searcher = HybridSearcher::new(
            Arc::new(HttpEmbedder::new(http_client.clone(), config.llm.clone())),
            vectors.clone(),
            bm25.clone(),
        )
        .with_config(&config.search);
        let generator = Arc::new(LlmAnswerGenerator::new(
            http_client.clone(),
            config.llm.clone(),
        ));

        Ok(Self {
            pipeline: RagPipeline::new(searcher, generator),
            config,
            bm25,
            vectors,
            http_client,
        })
    }
}
