//! amadeus-server – HTTP front end of the GDS learning assistant.
//!
//! Startup order:
//! 1. Load `.env` and [`config::Config`] from the environment.
//! 2. Initialise `tracing` (stdout, optional JSON, optional rolling file).
//! 3. Build the shared collaborators: HTTP client, embedder, vector store,
//!    retriever, ingestor and conversation memory.
//! 4. Build the Axum router and serve until SIGINT / SIGTERM.

mod config;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use amadeus_agent::MemoryCheckpointer;
use amadeus_rag::{Embedder, Ingestor, MemoryStore, OpenAiEmbedder, Retriever, SupabaseStore, VectorStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ──────────────────────────────────────────────────────
    let dotenv = dotenvy::dotenv();
    let cfg = Config::from_env();

    // ── 2. Logging ────────────────────────────────────────────────────────────
    let _log_guard = init_tracing(&cfg);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded .env");
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %cfg.bind_address,
        model = %cfg.model,
        "amadeus-server starting"
    );

    let environment = cfg.validate();
    for problem in &environment.errors {
        warn!(%problem, "configuration error");
    }
    for problem in &environment.warnings {
        warn!(%problem, "configuration warning");
    }

    // ── 3. Collaborators ──────────────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .user_agent(concat!("amadeus-server/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(
        http.clone(),
        cfg.openai_api_key.clone(),
        cfg.embedding_model.clone(),
    ));

    let store: Arc<dyn VectorStore> = match cfg.supabase() {
        Some((url, key)) => Arc::new(SupabaseStore::new(http.clone(), url, key, Arc::clone(&embedder))),
        None => Arc::new(MemoryStore::new(Arc::clone(&embedder))),
    };
    info!(store = store.kind(), upload_dir = %cfg.upload_dir, "knowledge base ready");

    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        http,
        retriever: Arc::new(Retriever::new(Arc::clone(&store))),
        ingestor: Arc::new(Ingestor::new(store, &cfg.upload_dir)),
        checkpointer: Arc::new(MemoryCheckpointer::new()),
    });

    // ── 4. HTTP server ────────────────────────────────────────────────────────
    let app = routes::build(Arc::clone(&state));

    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("amadeus-server stopped");
    Ok(())
}

/// Install the global subscriber. The returned guard flushes the file
/// writer and must live until shutdown.
fn init_tracing(cfg: &Config) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_env("AMADEUS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(&cfg.log_level))
        .unwrap_or_else(|e| {
            eprintln!(
                "WARN: invalid log filter {:?} ({e}); falling back to \"info\"",
                cfg.log_level
            );
            EnvFilter::new("info")
        });

    let (file_writer, guard) = match &cfg.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "amadeus-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };
    let file_layer = file_writer.map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer)
    });

    let registry = tracing_subscriber::registry().with(env_filter).with(file_layer);
    if cfg.log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .init();
    }
    guard
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c    => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, draining connections");
}
