//! Test doubles shared by the engine, ledger and router tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use uuid::Uuid;

use crate::activity::ledger::ActivityLedger;
use crate::activity::models::{Contribution, UserStats};
use crate::activity::reducer::StatsPolicy;
use crate::activity::store::{LedgerStore, MemoryLedgerStore};
use crate::clock::manual::ManualClock;
use crate::config::Config;
use crate::interview::engine::{EngineSettings, SessionEngine};
use crate::interview::models::{
    InterviewSession, SessionInsights, SessionMetrics, SessionResponse, SessionStatus,
    UserSessionSummary,
};
use crate::interview::store::{MemorySessionStore, SessionPage, SessionStore, StoreError};
use crate::llm_client::{CompletionRequest, LlmError, LlmGateway};
use crate::resume::ResumeProvider;

pub const ANALYSIS_JSON: &str = r#"{
    "overallScore": 8, "contentScore": 8, "structureScore": 7,
    "communicationScore": 8, "confidenceScore": 7,
    "feedback": "Clear structure and a quantified result.",
    "strengths": ["Quantified impact"], "improvements": ["Name the trade-offs"],
    "starMethod": {"situation": "present", "task": "present", "action": "present", "result": "present", "score": 8},
    "keywordMatch": 7, "specificExamples": true,
    "recommendations": ["Keep answers under two minutes"]
}"#;

pub const INSIGHTS_JSON: &str = r#"{
    "overallAssessment": "A focused session with strong technical answers.",
    "totalScore": 78,
    "categoryScores": {"content": 8, "structure": 7, "communication": 8, "confidence": 7},
    "strengths": ["Depth"], "keyImprovements": ["Structure"],
    "detailedFeedback": {"content": "c", "structure": "s", "communication": "m"},
    "questionAnalytics": [
        {"questionNumber": 1, "score": 8, "category": "technical"},
        {"questionNumber": 2, "score": 6, "category": "behavioral"}
    ],
    "recommendations": ["Practise STAR"], "nextSteps": "Do two more sessions this week."
}"#;

pub fn questions_json(n: usize) -> String {
    let questions: Vec<String> = (1..=n).map(|i| format!("Generated question {i}?")).collect();
    serde_json::to_string(&questions).unwrap()
}

// ─── LLM ─────────────────────────────────────────────────────────────────────

/// Replays scripted results in order; once the script runs out every call
/// fails as unavailable.
pub struct ScriptedLlm {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(script: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replies(replies: &[&str]) -> Self {
        Self::new(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn down() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::UpstreamUnavailable("script exhausted".into())))
    }
}

// ─── Session store ───────────────────────────────────────────────────────────

/// In-memory store whose writes can be switched to fail.
#[derive(Default)]
pub struct FlakySessionStore {
    inner: MemorySessionStore,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl FlakySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Persist("connection reset".into()));
        }
        Ok(())
    }

    fn check_read(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Persist("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn create(&self, session: &InterviewSession) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.create(session).await
    }

    async fn append_response(
        &self,
        session_id: &str,
        response: &SessionResponse,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.append_response(session_id, response).await
    }

    async fn lookup(&self, session_id: &str) -> Result<Option<InterviewSession>, StoreError> {
        self.check_read()?;
        self.inner.lookup(session_id).await
    }

    async fn lookup_by_user(&self, user_id: Uuid) -> Result<Option<InterviewSession>, StoreError> {
        self.check_read()?;
        self.inner.lookup_by_user(user_id).await
    }

    async fn lookup_most_recent_any(&self) -> Result<Option<InterviewSession>, StoreError> {
        self.check_read()?;
        self.inner.lookup_most_recent_any().await
    }

    async fn mark_complete(
        &self,
        session_id: &str,
        metrics: &SessionMetrics,
        insights: &SessionInsights,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner
            .mark_complete(session_id, metrics, insights, completed_at)
            .await
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
        status: Option<SessionStatus>,
    ) -> Result<SessionPage, StoreError> {
        self.check_read()?;
        self.inner.list_by_user(user_id, page, limit, status).await
    }

    async fn user_summary(&self, user_id: Uuid) -> Result<UserSessionSummary, StoreError> {
        self.check_read()?;
        self.inner.user_summary(user_id).await
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.check_write()?;
        self.inner.delete(session_id).await
    }
}

// ─── Ledger store ────────────────────────────────────────────────────────────

/// Every operation fails.
pub struct BrokenLedgerStore;

#[async_trait]
impl LedgerStore for BrokenLedgerStore {
    async fn load_day(&self, _: Uuid, _: NaiveDate) -> Result<Option<Contribution>, StoreError> {
        Err(StoreError::Persist("ledger offline".into()))
    }

    async fn load_range(
        &self,
        _: Uuid,
        _: NaiveDate,
        _: NaiveDate,
    ) -> Result<Vec<Contribution>, StoreError> {
        Err(StoreError::Persist("ledger offline".into()))
    }

    async fn load_all(&self, _: Uuid) -> Result<Vec<Contribution>, StoreError> {
        Err(StoreError::Persist("ledger offline".into()))
    }

    async fn load_stats(&self, _: Uuid) -> Result<Option<UserStats>, StoreError> {
        Err(StoreError::Persist("ledger offline".into()))
    }

    async fn commit(&self, _: Uuid, _: &Contribution, _: &UserStats) -> Result<(), StoreError> {
        Err(StoreError::Persist("ledger offline".into()))
    }

    async fn save_stats(&self, _: Uuid, _: &UserStats) -> Result<(), StoreError> {
        Err(StoreError::Persist("ledger offline".into()))
    }
}

// ─── Resume ──────────────────────────────────────────────────────────────────

pub struct StaticResume(pub String);

#[async_trait]
impl ResumeProvider for StaticResume {
    async fn latest_resume_text(&self, _user_id: Uuid) -> String {
        self.0.clone()
    }
}

// ─── Wiring ──────────────────────────────────────────────────────────────────

pub struct Harness {
    pub llm: Arc<ScriptedLlm>,
    pub store: Arc<FlakySessionStore>,
    pub ledger: Arc<ActivityLedger>,
    pub clock: Arc<ManualClock>,
    pub engine: SessionEngine,
}

impl Harness {
    pub fn new(llm: ScriptedLlm) -> Self {
        Self::build(llm, Arc::new(MemoryLedgerStore::new()), EngineSettings::default())
    }

    pub fn build(
        llm: ScriptedLlm,
        ledger_store: Arc<dyn LedgerStore>,
        settings: EngineSettings,
    ) -> Self {
        let llm = Arc::new(llm);
        let store = Arc::new(FlakySessionStore::new());
        let clock = Arc::new(ManualClock::at(2026, 3, 2, 9));
        let ledger = Arc::new(ActivityLedger::new(
            ledger_store,
            clock.clone(),
            FixedOffset::east_opt(0).unwrap(),
            StatsPolicy::default(),
        ));
        let engine = SessionEngine::new(
            llm.clone(),
            store.clone(),
            Arc::new(StaticResume(String::new())),
            ledger.clone(),
            clock.clone(),
            settings,
        );
        Self {
            llm,
            store,
            ledger,
            clock,
            engine,
        }
    }
}

/// Configuration for router tests: in-memory stores, no transcription backend.
pub fn test_config() -> Config {
    Config {
        database_url: None,
        anthropic_api_key: String::new(),
        llm_model: "test-model".to_string(),
        llm_analysis_timeout_secs: 30,
        llm_bulk_timeout_secs: 60,
        llm_retry_attempts: 1,
        question_count: 15,
        min_answer_chars: 10,
        improvement_window: 5,
        activity_utc_offset_minutes: 0,
        allow_global_session_fallback: true,
        transcription_url: None,
        port: 0,
        rust_log: "debug".to_string(),
    }
}
