mod activity;
mod clock;
mod config;
mod db;
mod errors;
mod interview;
mod llm_client;
mod models;
mod resume;
mod routes;
mod state;
mod sync;
mod transcription;

#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::activity::ledger::ActivityLedger;
use crate::activity::pg_store::PgLedgerStore;
use crate::activity::store::{LedgerStore, MemoryLedgerStore};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::db::create_pool;
use crate::interview::engine::SessionEngine;
use crate::interview::pg_store::PgSessionStore;
use crate::interview::store::{MemorySessionStore, SessionStore};
use crate::llm_client::LlmClient;
use crate::resume::{NoResume, PgResumeProvider, ResumeProvider};
use crate::routes::build_router;
use crate::state::AppState;
use crate::transcription::{HttpTranscriber, Transcriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed numeric env vars)
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

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Storage: PostgreSQL when configured, otherwise process-local
    let (sessions, ledger_store, resumes): (
        Arc<dyn SessionStore>,
        Arc<dyn LedgerStore>,
        Arc<dyn ResumeProvider>,
    ) = match &config.database_url {
        Some(url) => {
            let db = create_pool(url).await?;
            (
                Arc::new(PgSessionStore::new(db.clone())),
                Arc::new(PgLedgerStore::new(db.clone())),
                Arc::new(PgResumeProvider::new(db)),
            )
        }
        None => {
            warn!("DATABASE_URL not set, sessions and activity are kept in memory only");
            (
                Arc::new(MemorySessionStore::new()),
                Arc::new(MemoryLedgerStore::new()),
                Arc::new(NoResume),
            )
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.llm_model.clone());
    if config.anthropic_api_key.trim().is_empty() {
        warn!("ANTHROPIC_API_KEY not set, every session will use local fallbacks");
    }
    info!("LLM client initialized (model: {})", llm.model());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let ledger = Arc::new(ActivityLedger::new(
        ledger_store,
        clock.clone(),
        config.activity_offset()?,
        config.stats_policy(),
    ));

    let engine = Arc::new(SessionEngine::new(
        Arc::new(llm),
        sessions,
        resumes,
        ledger.clone(),
        clock,
        config.engine_settings(),
    ));
    info!("Session engine ready: {:?}", engine.settings());

    let transcriber = config.transcription_url.clone().map(|url| {
        info!("Transcription backend: {url}");
        Arc::new(HttpTranscriber::new(url)) as Arc<dyn Transcriber>
    });

    // Build app state
    let state = AppState {
        engine,
        ledger,
        transcriber,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
