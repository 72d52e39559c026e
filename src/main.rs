use axum::routing::{delete, get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use hybrid_rag::api;
use hybrid_rag::config::Config;
use hybrid_rag::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);
    tracing::info!(
        "Upstream timeout: {}s, max topK: {}",
        config.search.upstream_timeout_secs,
        config.search.max_top_k
    );

    let state = AppState::new(config.clone())?;

    let app = Router::new()
        .route("/api/health", get(api::documents::health))
        .route("/api/documents", post(api::documents::ingest))
        .route("/api/documents/{id}", delete(api::documents::delete_document))
        .route("/api/retrieve", post(api::search::retrieve))
        .route("/api/hybrid-search", post(api::search::hybrid_search))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
