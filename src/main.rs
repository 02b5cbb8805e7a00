use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use jotion::app::{build_router, AppState};
use jotion::config::{AppConfig, DatabaseBackend, DatabaseConfig, StorageBackend, StorageConfig};
use jotion::db::memory::MemoryDocumentRepository;
use jotion::db::repository::DocumentRepository;
use jotion::events::EventHub;
use jotion::storage::client::{MemoryStorageClient, StorageClient};
use jotion::store::DocumentStore;

/// Hierarchical note-taking backend.
#[derive(Debug, Parser)]
#[command(name = "jotion", version, about)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./jotion.toml if present).
    #[arg(short, long, env = "JOTION_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listen address from the configuration.
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jotion=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(addr) = cli.addr {
        config.server.addr = addr;
    }

    tracing::info!("Starting Jotion server...");

    let repo = document_repository(&config.database).await?;
    let storage_client = storage_client(&config.storage).await?;

    let store = DocumentStore::new(repo, EventHub::default(), config.store.cascade);
    tracing::info!(cascade = ?config.store.cascade, "Document store ready");

    if config.auth.demo_mode {
        tracing::warn!("Demo mode enabled: cookie login with built-in users");
        jotion::demo_seeder::seed_demo_data(&store)
            .await
            .context("Failed to seed demo data")?;
    }
    if config.auth.jwt_secret.is_none() && !config.auth.demo_mode {
        tracing::warn!("No JWT secret configured and demo mode is off: every request is anonymous");
    }

    let app_state = AppState::new(store, storage_client, config.auth.clone());
    let app = build_router(app_state, &config.server.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.addr))?;
    tracing::info!("Listening on http://{}", config.server.addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn document_repository(config: &DatabaseConfig) -> anyhow::Result<Arc<dyn DocumentRepository>> {
    match config.backend {
        DatabaseBackend::Memory => {
            tracing::info!("Using in-memory document repository");
            Ok(Arc::new(MemoryDocumentRepository::new()))
        }
        #[cfg(feature = "mongo")]
        DatabaseBackend::Mongo => {
            let client = mongodb::Client::with_uri_str(&config.uri)
                .await
                .context("Failed to connect to MongoDB")?;
            let repo = jotion::db::repository::MongoDocumentRepository::new(&client.database(&config.name));
            repo.ensure_indexes().await?;
            tracing::info!("Connected to MongoDB at {}", config.uri);
            Ok(Arc::new(repo))
        }
        #[cfg(not(feature = "mongo"))]
        DatabaseBackend::Mongo => anyhow::bail!("MongoDB backend requires the `mongo` feature"),
    }
}

async fn storage_client(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageClient>> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory image storage");
            Ok(Arc::new(MemoryStorageClient::new()))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let client = jotion::storage::client::S3StorageClient::connect(
                config.bucket.clone(),
                config.endpoint.as_deref(),
            )
            .await?;
            tracing::info!(bucket = %config.bucket, "S3 storage client initialized");
            Ok(Arc::new(client))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => anyhow::bail!("S3 storage requires the `s3` feature"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    tracing::info!("Shutting down");
}
