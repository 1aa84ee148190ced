mod api;
mod config;
mod feedback;
mod llm;
mod storage;

use crate::api::AppState;
use crate::config::AppConfig;
use crate::feedback::FeedbackNormalizer;
use crate::llm::GeminiClient;
use crate::storage::ReviewStore;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("🚀 Starting AI Feedback API");

    // Load configuration (missing GEMINI_API_KEY is fatal)
    let config = AppConfig::load()?;
    info!("📋 Configuration loaded");
    info!("   - Model: {}", config.gemini.model);
    info!("   - Database: {}", config.storage.database_path.display());
    info!("   - Server: {}", config.bind_address());

    // Open review storage
    info!("💾 Opening review storage...");
    let store = Arc::new(ReviewStore::open(
        &config.storage.database_path,
        config.storage.busy_timeout(),
    )?);
    let review_count = store.count().await?;
    info!("✅ Review storage ready ({} reviews)", review_count);

    // Wire the model client into the normalizer
    let generator = Arc::new(GeminiClient::new(config.gemini.clone()));
    let normalizer = Arc::new(FeedbackNormalizer::new(generator));
    info!("🧠 Feedback normalizer ready");

    let state = AppState {
        store: store.clone(),
        normalizer,
    };

    let app = api::router(state);

    // Start server
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📡 Available endpoints:");
    info!("   GET  /health           - Health check");
    info!("   POST /reviews          - Submit a review");
    info!("   GET  /reviews          - List reviews, newest first");
    info!("   GET  /reviews/stats    - Rating statistics");
    info!("");
    info!("✨ Server is ready to accept requests!");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Close storage on graceful shutdown
    match store.close().await {
        Ok(()) => info!("✅ Review storage closed"),
        Err(e) => warn!(error = %e, "⚠️  Failed to close review storage"),
    }

    info!("👋 Server shutting down gracefully");

    Ok(())
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received");
}
