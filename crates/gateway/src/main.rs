//! Verdant HTTP gateway
//!
//! The entry point for all external requests. Wires the ingestion and
//! query pipelines to their collaborators and exposes:
//! - Document registration and indexing
//! - Question answering with citations
//! - Health and readiness probes

mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use verdant_common::{
    config::AppConfig,
    db::{ChunkStore, DocumentStore, RestChunkStore, RestDocumentStore},
    llm::{OpenAiCompletion, OpenAiEmbeddings},
    metrics,
    storage::{ObjectStorage, SupabaseStorage},
};
use verdant_ingestion::{IngestionPipeline, LlamaParseClient};
use verdant_query::QueryPipeline;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub documents: Arc<dyn DocumentStore>,
    pub chunks: Arc<dyn ChunkStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub ingestion: Arc<IngestionPipeline>,
    pub query: Arc<QueryPipeline>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?);

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!("Starting Verdant gateway v{}", verdant_common::VERSION);

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter on {}", metrics_addr);
    }

    // Collaborator clients
    let timeout = config.server.request_timeout_secs;
    let storage: Arc<dyn ObjectStorage> = Arc::new(SupabaseStorage::new(
        &config.store.url,
        &config.store.service_key,
        &config.store.bucket,
        timeout,
    )?);
    let documents: Arc<dyn DocumentStore> = Arc::new(RestDocumentStore::new(
        &config.store.url,
        &config.store.service_key,
        timeout,
    )?);
    let chunks: Arc<dyn ChunkStore> = Arc::new(RestChunkStore::new(
        &config.store.url,
        &config.store.service_key,
        timeout,
    )?);
    let embeddings = Arc::new(OpenAiEmbeddings::new(&config.embedding)?);
    let completion = Arc::new(OpenAiCompletion::new(&config.completion)?);
    let parse_jobs = Arc::new(LlamaParseClient::new(&config.parsing, timeout)?);

    // Pipelines
    let ingestion = Arc::new(IngestionPipeline::new(
        &config,
        documents.clone(),
        chunks.clone(),
        storage.clone(),
        embeddings.clone(),
        parse_jobs,
    ));
    let query = Arc::new(QueryPipeline::new(
        &config,
        documents.clone(),
        chunks.clone(),
        storage.clone(),
        embeddings,
        completion,
    ));

    let state = AppState {
        config: config.clone(),
        documents,
        chunks,
        storage,
        ingestion,
        query,
    };

    // Build the router and serve
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        // Ingestion pipeline
        .route("/documents/register", post(handlers::documents::register))
        .route("/ingest", post(handlers::documents::ingest))
        // Query pipeline
        .route("/ask", post(handlers::ask::ask))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
