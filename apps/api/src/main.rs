mod automation;
mod config;
mod db;
mod errors;
mod generation;
mod llm_client;
mod media;
mod models;
mod publish;
mod routes;
mod scheduler;
mod selection;
mod state;
mod store;

use anyhow::Result;
use aws_config::timeout::TimeoutConfig;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::automation::{AutomationEngine, EngineConfig};
use crate::config::{Config, StorageBackend};
use crate::db::create_pool;
use crate::llm_client::images::{ImageModel, OpenAiImageClient};
use crate::llm_client::LlmClient;
use crate::media::storage::{LocalStorage, MediaStorage, S3Storage};
use crate::media::MediaResolver;
use crate::publish::graph_api::GraphClient;
use crate::publish::Publisher;
use crate::routes::build_router;
use crate::scheduler::AutomationScheduler;
use crate::selection::packs::PrebuiltPacks;
use crate::selection::ContentSelector;
use crate::state::AppState;
use crate::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Autopost API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(db));

    // Initialize model clients
    let llm = Arc::new(LlmClient::new(
        config.anthropic_api_key.clone(),
        config.http_timeout,
    ));
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let images: Option<Arc<dyn ImageModel>> = match &config.openai_api_key {
        Some(key) => {
            info!("Image client initialized (model: {})", llm_client::images::IMAGE_MODEL);
            Some(Arc::new(OpenAiImageClient::new(key.clone(), config.http_timeout)))
        }
        None => {
            info!("OPENAI_API_KEY not set; AI image modes will fall back to the last upload");
            None
        }
    };

    // Initialize media storage
    let storage: Arc<dyn MediaStorage> = match &config.storage {
        StorageBackend::Local { root } => {
            info!("Media storage: local directory {}", root.display());
            Arc::new(LocalStorage::new(
                root.clone(),
                config.media_public_base_url.clone(),
            ))
        }
        StorageBackend::S3 {
            bucket,
            endpoint,
            access_key_id,
            secret_access_key,
        } => {
            let s3 = build_s3_client(
                endpoint,
                access_key_id,
                secret_access_key,
                config.http_timeout,
            )
            .await;
            info!("Media storage: S3 bucket {bucket}");
            Arc::new(S3Storage::new(
                s3,
                bucket.clone(),
                config.media_public_base_url.clone(),
            ))
        }
    };

    // Prebuilt content packs
    let packs = match &config.packs_path {
        Some(path) => PrebuiltPacks::load(path)?,
        None => PrebuiltPacks::new(Vec::new()),
    };

    // Wire the pipeline
    let selector = ContentSelector::new(store.clone(), store.clone(), Arc::new(packs));
    let media = MediaResolver::new(
        store.clone(),
        images,
        storage,
        config.placeholder_image_url.clone(),
    )
    .with_store_timeout(config.http_timeout);
    let publisher = Arc::new(Publisher::new(
        Arc::new(GraphClient::new(
            config.graph_api_base.clone(),
            config.http_timeout,
        )),
        config.publish_config(),
    ));
    let engine = Arc::new(AutomationEngine::new(
        store.clone(),
        selector,
        media,
        llm,
        publisher,
        EngineConfig {
            topic_variations: config.topic_variations,
        },
    ));

    // Start the scheduler
    let scheduler = Arc::new(AutomationScheduler::new(engine, config.sweep_interval));
    scheduler.start().await?;

    // Build app state
    let state = AppState {
        store,
        scheduler: scheduler.clone(),
    };

    // Build router
    let mut app = build_router(state);
    if let StorageBackend::Local { root } = &config.storage {
        app = app.nest_service("/media", ServeDir::new(root));
    }
    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(
    endpoint: &str,
    access_key_id: &str,
    secret_access_key: &str,
    timeout: Duration,
) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        access_key_id,
        secret_access_key,
        None,
        None,
        "autopost-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(endpoint)
        .timeout_config(
            TimeoutConfig::builder()
                .operation_timeout(timeout)
                .build(),
        )
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
