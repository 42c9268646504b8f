use std::sync::Arc;

use crate::activity::ledger::ActivityLedger;
use crate::config::Config;
use crate::interview::engine::SessionEngine;
use crate::transcription::Transcriber;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SessionEngine>,
    pub ledger: Arc<ActivityLedger>,
    /// `None` when no transcription backend is configured.
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub config: Config,
}
