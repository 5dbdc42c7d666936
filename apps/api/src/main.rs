mod analysis_client;
mod applications;
mod config;
mod db;
mod errors;
mod jobs;
mod mailer;
mod models;
mod notes;
mod resume_storage;
mod routes;
mod state;
mod store;

#[cfg(test)]
mod test_support;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analysis_client::{AnalysisDispatcher, DisabledAnalysis, HttpAnalysisClient};
use crate::applications::submission::SubmissionService;
use crate::config::Config;
use crate::db::{create_pool, run_migrations};
use crate::mailer::HttpMailer;
use crate::resume_storage::S3ResumeStorage;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{ApplicationStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Desky API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let resumes = Arc::new(S3ResumeStorage::new(
        s3,
        config.s3_bucket.clone(),
        &config.s3_endpoint,
    ));
    info!("S3 resume storage initialized (bucket: {})", config.s3_bucket);

    let notifier = Arc::new(HttpMailer::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    ));

    let analysis: Arc<dyn AnalysisDispatcher> = match &config.analysis_service_url {
        Some(url) => {
            info!("Analysis dispatch enabled ({url})");
            Arc::new(HttpAnalysisClient::new(url))
        }
        None => {
            warn!("ANALYSIS_SERVICE_URL not set, analysis dispatch disabled");
            Arc::new(DisabledAnalysis)
        }
    };

    let state = AppState {
        store: store.clone(),
        resumes,
        submissions: SubmissionService::new(store, notifier, analysis),
        max_resume_bytes: config.max_resume_bytes,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `memory://` selects the in-process store for local development; anything
/// else is treated as a PostgreSQL URL.
async fn build_store(config: &Config) -> Result<Arc<dyn ApplicationStore>> {
    if config.database_url.starts_with("memory://") {
        warn!("Using in-memory store, data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    run_migrations(&pool).await?;
    Ok(Arc::new(PgStore::new(pool)))
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "desky-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
