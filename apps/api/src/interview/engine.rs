//! Session Engine: question generation, the answer loop, and completion.
//!
//! Lifecycle: Created -> QuestionsGenerated -> (AnswerSubmitted)* -> Completed.
//!
//! Only two things stop the flow: no usable questions, and a session that
//! cannot be resolved at completion. LLM failures fall through to the parser's
//! fallbacks; store and ledger failures are logged and reported as flags.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::activity::ledger::ActivityLedger;
use crate::activity::models::{ActivityMetadata, ActivityType};
use crate::clock::Clock;
use crate::interview::models::{
    AnswerAnalysis, AudioMetrics, InterviewSession, QuestionTiming, SessionInsights,
    SessionMetrics, SessionResponse, SessionStatus, UserSessionSummary,
};
use crate::interview::parser::{self, ParseError};
use crate::interview::prompts;
use crate::interview::session_id::{from_temporary_id, is_temporary, new_session_id, to_temporary_id};
use crate::interview::store::{SessionPage, SessionStore, StoreError};
use crate::llm_client::prompts::COACH_SYSTEM;
use crate::llm_client::{CallBudget, CompletionRequest, LlmGateway};
use crate::resume::ResumeProvider;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
pub const MAX_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Questions requested per session.
    pub question_count: usize,
    pub min_answer_chars: usize,
    /// Extra attempts on transient LLM failures, per engine call.
    pub llm_retry_attempts: u32,
    pub analysis_budget: CallBudget,
    pub bulk_budget: CallBudget,
    /// Whether completion may fall back to the newest session of any user.
    pub allow_global_session_fallback: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            question_count: 15,
            min_answer_chars: 10,
            llm_retry_attempts: 1,
            analysis_budget: CallBudget {
                max_tokens: 1500,
                timeout: Duration::from_secs(30),
            },
            bulk_budget: CallBudget {
                max_tokens: 4096,
                timeout: Duration::from_secs(60),
            },
            allow_global_session_fallback: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    InvalidAnswer(String),

    #[error("{0}")]
    Validation(String),

    #[error("interview session not found")]
    SessionNotFound,

    #[error("session {0} belongs to another user")]
    Forbidden(String),

    #[error(transparent)]
    NoUsableQuestions(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ────────────────────────────────────────────────────────────────────────────
// Operation inputs and results
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedQuestions {
    pub questions: Vec<String>,
    pub session_id: String,
    pub persisted: bool,
    pub used_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub session_id: String,
    pub question_index: usize,
    pub question: String,
    pub answer: String,
    pub audio_metrics: Option<AudioMetrics>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAnswer {
    pub analysis: AnswerAnalysis,
    pub persisted: bool,
    pub used_fallback: bool,
}

/// Which lookup found the session being completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    ExactId,
    TemporaryId,
    LatestForUser,
    LatestOverall,
}

/// Outcome of the best-effort activity recording done at completion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapUpdate {
    pub success: bool,
    /// False when nothing was recorded because the session was already complete.
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_contribution: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSession {
    pub session_id: String,
    pub insights: SessionInsights,
    pub metrics: SessionMetrics,
    pub heatmap_update: HeatmapUpdate,
    pub resolved_by: ResolutionStrategy,
    pub persisted: bool,
    pub used_fallback: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

pub struct SessionEngine {
    llm: Arc<dyn LlmGateway>,
    store: Arc<dyn SessionStore>,
    resumes: Arc<dyn ResumeProvider>,
    ledger: Arc<ActivityLedger>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl SessionEngine {
    pub fn new(
        llm: Arc<dyn LlmGateway>,
        store: Arc<dyn SessionStore>,
        resumes: Arc<dyn ResumeProvider>,
        ledger: Arc<ActivityLedger>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            llm,
            store,
            resumes,
            ledger,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // ─── generate ───────────────────────────────────────────────────────────

    pub async fn generate_questions(
        &self,
        job_description: &str,
        user_id: Uuid,
    ) -> Result<GeneratedQuestions, EngineError> {
        let job_description = job_description.trim();
        if job_description.is_empty() {
            return Err(EngineError::Validation(
                "Job description is required".to_string(),
            ));
        }

        let resume_text = self.resumes.latest_resume_text(user_id).await;
        if resume_text.trim().is_empty() {
            debug!("No resume on file for user {user_id}, generating from the job description only");
        }

        let prompt = prompts::build_question_prompt(
            job_description,
            &resume_text,
            self.settings.question_count,
        );
        let raw = self
            .complete_with_retry(&prompt, self.settings.bulk_budget, "question generation")
            .await;

        let parsed = parser::parse_questions(&raw)?;
        let used_fallback = parsed.used_fallback();
        let mut questions = parsed.value;
        questions.truncate(self.settings.question_count.max(1));

        let session = InterviewSession::new(
            new_session_id(),
            user_id,
            job_description.to_string(),
            questions,
            self.clock.now(),
        );

        let (session_id, persisted) = match self.store.create(&session).await {
            Ok(()) => (session.session_id.clone(), true),
            Err(e) => {
                warn!(
                    "Could not persist session {} for user {user_id}, returning it unpersisted: {e}",
                    session.session_id
                );
                (to_temporary_id(&session.session_id), false)
            }
        };

        info!(
            "Generated {} questions for user {user_id} (session {session_id}, persisted: {persisted}, fallback: {used_fallback})",
            session.questions.len()
        );

        Ok(GeneratedQuestions {
            questions: session.questions,
            session_id,
            persisted,
            used_fallback,
        })
    }

    // ─── answer ─────────────────────────────────────────────────────────────

    pub async fn submit_answer(
        &self,
        submission: AnswerSubmission,
    ) -> Result<SubmittedAnswer, EngineError> {
        if submission.question.trim().is_empty() {
            return Err(EngineError::Validation("Question is required".to_string()));
        }
        let answer = submission.answer.trim();
        if answer.chars().count() < self.settings.min_answer_chars {
            return Err(EngineError::InvalidAnswer(format!(
                "Answer must be at least {} characters long",
                self.settings.min_answer_chars
            )));
        }

        let storable = if is_temporary(&submission.session_id) {
            debug!(
                "Session {} is not persisted, skipping response storage",
                submission.session_id
            );
            false
        } else {
            self.check_question_index(&submission).await?
        };

        let prompt = prompts::build_answer_analysis_prompt(
            &submission.question,
            answer,
            submission.audio_metrics.as_ref(),
        );
        let raw = self
            .complete_with_retry(&prompt, self.settings.analysis_budget, "answer analysis")
            .await;
        let parsed = parser::parse_analysis(&raw, answer);
        let used_fallback = parsed.used_fallback();

        let response = SessionResponse {
            question_index: submission.question_index,
            question: submission.question.trim().to_string(),
            answer: answer.to_string(),
            audio_metrics: submission.audio_metrics,
            analysis: parsed.value,
            timestamp: self.clock.now(),
        };

        let persisted = if !storable {
            false
        } else {
            match self
                .store
                .append_response(&submission.session_id, &response)
                .await
            {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Could not store answer {} for session {}: {e}",
                        submission.question_index, submission.session_id
                    );
                    false
                }
            }
        };

        Ok(SubmittedAnswer {
            analysis: response.analysis,
            persisted,
            used_fallback,
        })
    }

    /// Rejects an index with no matching question in the stored session.
    /// Returns whether the response can be stored at all.
    async fn check_question_index(
        &self,
        submission: &AnswerSubmission,
    ) -> Result<bool, EngineError> {
        match self.store.lookup(&submission.session_id).await {
            Ok(Some(session)) if submission.question_index >= session.questions.len() => {
                Err(EngineError::Validation(format!(
                    "Question index {} is out of range for a session of {} questions",
                    submission.question_index,
                    session.questions.len()
                )))
            }
            Ok(Some(_)) => Ok(true),
            Ok(None) => {
                warn!(
                    "Session {} not found, answer will not be stored",
                    submission.session_id
                );
                Ok(false)
            }
            Err(e) => {
                warn!(
                    "Could not load session {} to check the answer, it will not be stored: {e}",
                    submission.session_id
                );
                Ok(false)
            }
        }
    }

    // ─── complete ───────────────────────────────────────────────────────────

    pub async fn complete_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        timings: &[QuestionTiming],
    ) -> Result<CompletedSession, EngineError> {
        let (session, resolved_by) = self.resolve_session(session_id, user_id).await?;

        if session.status == SessionStatus::Completed {
            if let (Some(insights), Some(metrics)) =
                (session.insights.clone(), session.session_metrics.clone())
            {
                info!(
                    "Session {} already completed, returning stored insights",
                    session.session_id
                );
                return Ok(CompletedSession {
                    session_id: session.session_id,
                    insights,
                    metrics,
                    heatmap_update: HeatmapUpdate {
                        success: true,
                        recorded: false,
                        new_contribution: None,
                        date: None,
                        error: None,
                    },
                    resolved_by,
                    persisted: true,
                    used_fallback: false,
                });
            }
        }

        let now = self.clock.now();
        let metrics = session.compute_metrics(now);

        let prompt = prompts::build_insights_prompt(&session, &metrics);
        let raw = self
            .complete_with_retry(&prompt, self.settings.bulk_budget, "session insights")
            .await;
        let parsed = parser::parse_insights(&raw, &session, &metrics);
        let used_fallback = parsed.used_fallback();
        let mut insights = parsed.value;
        insights.metrics = Some(metrics.clone());
        apply_timings(&mut insights, timings);

        let persisted = match self
            .store
            .mark_complete(&session.session_id, &metrics, &insights, now)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not mark session {} complete: {e}", session.session_id);
                false
            }
        };

        let heatmap_update = self.record_completion(user_id, &session, &metrics).await;

        info!(
            "Completed session {} for user {user_id} via {resolved_by:?}: {}/{} answered, avg {:.1}",
            session.session_id,
            metrics.completed_questions,
            metrics.total_questions,
            metrics.average_score
        );

        Ok(CompletedSession {
            session_id: session.session_id,
            insights,
            metrics,
            heatmap_update,
            resolved_by,
            persisted,
            used_fallback,
        })
    }

    /// Tries, in order: exact id, the id under a non-persisted marker, the
    /// user's newest session, and (when allowed) the newest session overall.
    async fn resolve_session(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> Result<(InterviewSession, ResolutionStrategy), EngineError> {
        if let Some(session) = self.try_lookup(self.store.lookup(session_id), "exact id").await {
            return Ok((session, ResolutionStrategy::ExactId));
        }

        if let Some(underlying) = from_temporary_id(session_id) {
            if let Some(session) = self
                .try_lookup(self.store.lookup(underlying), "unmarked id")
                .await
            {
                return Ok((session, ResolutionStrategy::TemporaryId));
            }
        }

        if let Some(session) = self
            .try_lookup(self.store.lookup_by_user(user_id), "latest for user")
            .await
        {
            warn!(
                "Session {session_id} not found, completing latest session {} of user {user_id}",
                session.session_id
            );
            return Ok((session, ResolutionStrategy::LatestForUser));
        }

        if self.settings.allow_global_session_fallback {
            if let Some(session) = self
                .try_lookup(self.store.lookup_most_recent_any(), "latest overall")
                .await
            {
                warn!(
                    "Session {session_id} not found for user {user_id}, completing most recent session {} overall",
                    session.session_id
                );
                return Ok((session, ResolutionStrategy::LatestOverall));
            }
        }

        warn!("Session {session_id} could not be resolved for user {user_id}");
        Err(EngineError::SessionNotFound)
    }

    async fn try_lookup(
        &self,
        lookup: impl std::future::Future<Output = Result<Option<InterviewSession>, StoreError>>,
        strategy: &str,
    ) -> Option<InterviewSession> {
        match lookup.await {
            Ok(found) => found,
            Err(e) => {
                warn!("Session lookup ({strategy}) failed: {e}");
                None
            }
        }
    }

    async fn record_completion(
        &self,
        user_id: Uuid,
        session: &InterviewSession,
        metrics: &SessionMetrics,
    ) -> HeatmapUpdate {
        let metadata = ActivityMetadata {
            session_id: Some(session.session_id.clone()),
            questions_answered: Some(metrics.completed_questions as u32),
            average_score: Some(metrics.average_score),
            duration_seconds: Some(metrics.total_duration * 60.0),
            completion_rate: Some(metrics.completion_rate),
            ..Default::default()
        };
        let description = format!(
            "Completed mock interview: {} of {} questions answered",
            metrics.completed_questions, metrics.total_questions
        );

        match self
            .ledger
            .record_activity(
                user_id,
                ActivityType::InterviewCompleted,
                Some(description),
                metadata,
            )
            .await
        {
            Ok(recorded) => HeatmapUpdate {
                success: true,
                recorded: true,
                new_contribution: Some(recorded.new_contribution),
                date: Some(recorded.date),
                error: None,
            },
            Err(e) => {
                warn!(
                    "Activity tracking failed for session {}: {e}",
                    session.session_id
                );
                HeatmapUpdate {
                    success: false,
                    recorded: false,
                    new_contribution: None,
                    date: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    // ─── history ────────────────────────────────────────────────────────────

    pub async fn get_session(
        &self,
        session_id: &str,
        user_id: Uuid,
    ) -> Result<InterviewSession, EngineError> {
        let session = self
            .store
            .lookup(session_id)
            .await?
            .ok_or(EngineError::SessionNotFound)?;
        if session.user_id != user_id {
            return Err(EngineError::Forbidden(session_id.to_string()));
        }
        Ok(session)
    }

    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
        status: Option<SessionStatus>,
    ) -> Result<SessionPage, EngineError> {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        Ok(self.store.list_by_user(user_id, page, limit, status).await?)
    }

    pub async fn session_stats(&self, user_id: Uuid) -> Result<UserSessionSummary, EngineError> {
        Ok(self.store.user_summary(user_id).await?)
    }

    pub async fn delete_session(&self, session_id: &str, user_id: Uuid) -> Result<(), EngineError> {
        self.get_session(session_id, user_id).await?;
        self.store.delete(session_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => EngineError::SessionNotFound,
            other => EngineError::Store(other),
        })?;
        info!("Deleted session {session_id} for user {user_id}");
        Ok(())
    }

    // ─── LLM ────────────────────────────────────────────────────────────────

    /// Calls the gateway, retrying transient failures with exponential backoff.
    /// Any final failure becomes an empty completion for the parser to replace.
    async fn complete_with_retry(&self, prompt: &str, budget: CallBudget, purpose: &str) -> String {
        let request = CompletionRequest {
            system: COACH_SYSTEM,
            prompt,
            budget,
        };

        let mut attempt: u32 = 0;
        loop {
            match self.llm.complete(request).await {
                Ok(text) => return text,
                Err(e) if e.is_transient() && attempt < self.settings.llm_retry_attempts => {
                    let delay = RETRY_BASE_DELAY * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        "LLM call for {purpose} failed ({e}), retry {attempt}/{} in {}ms",
                        self.settings.llm_retry_attempts,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    warn!("LLM call for {purpose} failed, using fallback: {e}");
                    return String::new();
                }
            }
        }
    }
}

/// Copies client-reported time per question onto the matching analytics entry.
fn apply_timings(insights: &mut SessionInsights, timings: &[QuestionTiming]) {
    for timing in timings {
        if let Some(entry) = insights
            .question_analytics
            .iter_mut()
            .find(|qa| qa.question_number.checked_sub(1) == Some(timing.question_index))
        {
            entry.time_spent_seconds = Some(timing.time_spent_seconds.max(0.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::fallback::FALLBACK_QUESTIONS;
    use crate::llm_client::LlmError;
    use crate::testing::{
        questions_json, BrokenLedgerStore, Harness, ScriptedLlm, ANALYSIS_JSON, INSIGHTS_JSON,
    };
    use chrono::Duration as ChronoDuration;

    const JD: &str = "Senior backend engineer, Go, distributed systems";
    const ANSWER: &str =
        "I led a team of 4 engineers to redesign our billing pipeline, cutting latency 40%.";

    fn submission(session_id: &str, index: usize) -> AnswerSubmission {
        AnswerSubmission {
            session_id: session_id.to_string(),
            question_index: index,
            question: format!("Generated question {}?", index.saturating_add(1)),
            answer: ANSWER.to_string(),
            audio_metrics: None,
        }
    }

    // ─── generate ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_generate_questions_from_model() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(15)]));
        let user = Uuid::new_v4();

        let generated = h.engine.generate_questions(JD, user).await.unwrap();
        assert_eq!(generated.questions.len(), 15);
        assert!(generated.persisted);
        assert!(!generated.used_fallback);

        let stored = h.store.lookup(&generated.session_id).await.unwrap().unwrap();
        assert_eq!(stored.user_id, user);
        assert_eq!(stored.status, SessionStatus::Active);
        assert!(h.llm.prompts()[0].contains("No resume on file"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_questions_falls_back_when_model_is_down() {
        let h = Harness::new(ScriptedLlm::down());

        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();
        assert_eq!(generated.questions.len(), FALLBACK_QUESTIONS.len());
        assert!(generated.used_fallback);
        assert!(generated.persisted);
        // one attempt plus one retry
        assert_eq!(h.llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_generate_questions_unpersisted_when_store_fails() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(15)]));
        h.store.fail_writes(true);

        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();
        assert!(!generated.persisted);
        assert!(is_temporary(&generated.session_id));
        assert_eq!(generated.questions.len(), 15);
    }

    #[tokio::test]
    async fn test_generate_questions_all_blank_is_an_error() {
        let h = Harness::new(ScriptedLlm::replies(&[r#"["", "   "]"#]));
        let err = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::NoUsableQuestions(_)));
    }

    #[tokio::test]
    async fn test_generate_questions_rejects_blank_job_description() {
        let h = Harness::new(ScriptedLlm::down());
        let err = h.engine.generate_questions("  ", Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_generate_questions_caps_to_configured_count() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(20)]));
        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();
        assert_eq!(generated.questions.len(), 15);
    }

    // ─── answer ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_submit_answer_with_unparseable_model_output() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(15), "not json at all"]));
        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();

        let submitted = h
            .engine
            .submit_answer(submission(&generated.session_id, 2))
            .await
            .unwrap();
        assert_eq!(submitted.analysis.overall_score, 6);
        assert!(!submitted.analysis.feedback.is_empty());
        assert!(submitted.used_fallback);
        assert!(submitted.persisted);
    }

    #[tokio::test]
    async fn test_submit_answer_survives_store_failure() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(15), ANALYSIS_JSON]));
        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();
        h.store.fail_writes(true);

        let submitted = h
            .engine
            .submit_answer(submission(&generated.session_id, 0))
            .await
            .unwrap();
        assert_eq!(submitted.analysis.overall_score, 8);
        assert!(!submitted.persisted);
    }

    #[tokio::test]
    async fn test_submit_answer_to_temporary_session_skips_store() {
        let h = Harness::new(ScriptedLlm::replies(&[ANALYSIS_JSON]));
        let submitted = h
            .engine
            .submit_answer(submission(&to_temporary_id("abc"), 0))
            .await
            .unwrap();
        assert!(!submitted.persisted);
        assert!(!submitted.used_fallback);
    }

    #[tokio::test]
    async fn test_submit_answer_rejects_short_answers() {
        let h = Harness::new(ScriptedLlm::down());
        let mut short = submission("s", 0);
        short.answer = "   yes I did  ".to_string();

        let err = h.engine.submit_answer(short).await.unwrap_err();
        assert!(
            matches!(err, EngineError::InvalidAnswer(ref m) if m == "Answer must be at least 10 characters long")
        );
        assert_eq!(h.llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_resubmitting_same_index_replaces_response() {
        let h = Harness::new(ScriptedLlm::replies(&[
            &questions_json(3),
            ANALYSIS_JSON,
            "garbage",
        ]));
        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();
        h.engine.submit_answer(submission(&generated.session_id, 1)).await.unwrap();
        h.engine.submit_answer(submission(&generated.session_id, 1)).await.unwrap();

        let stored = h.store.lookup(&generated.session_id).await.unwrap().unwrap();
        assert_eq!(stored.responses.len(), 1);
        assert_eq!(stored.responses[0].analysis.overall_score, 6);
    }

    #[tokio::test]
    async fn test_submit_answer_rejects_index_past_last_question() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(3), ANALYSIS_JSON]));
        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();

        for index in [3, usize::MAX] {
            let err = h
                .engine
                .submit_answer(submission(&generated.session_id, index))
                .await
                .unwrap_err();
            assert!(matches!(err, EngineError::Validation(ref m) if m.contains("out of range")));
        }
        assert_eq!(h.llm.calls(), 1);

        let stored = h.store.lookup(&generated.session_id).await.unwrap().unwrap();
        assert!(stored.responses.is_empty());
    }

    // ─── complete ──────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_complete_three_of_five() {
        let h = Harness::new(ScriptedLlm::replies(&[
            &questions_json(5),
            ANALYSIS_JSON,
            "not json at all",
            ANALYSIS_JSON,
            INSIGHTS_JSON,
        ]));
        let user = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, user).await.unwrap();
        for index in [0, 2, 4] {
            h.engine
                .submit_answer(submission(&generated.session_id, index))
                .await
                .unwrap();
        }
        h.clock.advance(ChronoDuration::minutes(24));

        let timings = [QuestionTiming {
            question_index: 0,
            time_spent_seconds: 95.0,
        }];
        let done = h
            .engine
            .complete_session(&generated.session_id, user, &timings)
            .await
            .unwrap();

        assert_eq!(done.resolved_by, ResolutionStrategy::ExactId);
        assert_eq!(done.metrics.completion_rate, 60.0);
        assert!((done.metrics.average_score - 22.0 / 3.0).abs() < 1e-9);
        assert_eq!(done.metrics.total_duration, 24.0);
        assert!(!done.used_fallback);
        assert_eq!(done.insights.metrics, Some(done.metrics.clone()));
        assert_eq!(done.insights.question_analytics[0].time_spent_seconds, Some(95.0));
        assert_eq!(done.insights.question_analytics[1].time_spent_seconds, None);
        assert!(done.heatmap_update.success);
        assert!(done.heatmap_update.recorded);

        let stored = h.store.lookup(&generated.session_id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);

        let view = h.ledger.stats(user).await.unwrap();
        assert_eq!(view.stats.total_interviews, 1);
        assert_eq!(view.stats.total_questions, 3);
        assert_eq!(view.stats.total_practice_time, 24);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_with_model_down_uses_local_insights() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(2), ANALYSIS_JSON]));
        let user = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, user).await.unwrap();
        h.engine.submit_answer(submission(&generated.session_id, 0)).await.unwrap();

        let done = h
            .engine
            .complete_session(&generated.session_id, user, &[])
            .await
            .unwrap();
        assert!(done.used_fallback);
        assert_eq!(done.insights.total_score, 80.0);
        assert_eq!(done.insights.question_analytics.len(), 1);
        assert_eq!(done.metrics.completion_rate, 50.0);
    }

    #[tokio::test]
    async fn test_complete_resolves_temporary_marker() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(3), INSIGHTS_JSON]));
        let user = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, user).await.unwrap();

        let done = h
            .engine
            .complete_session(&to_temporary_id(&generated.session_id), user, &[])
            .await
            .unwrap();
        assert_eq!(done.resolved_by, ResolutionStrategy::TemporaryId);
        assert_eq!(done.session_id, generated.session_id);
    }

    #[tokio::test]
    async fn test_complete_falls_back_to_latest_for_user_then_overall() {
        let h = Harness::new(ScriptedLlm::replies(&[
            &questions_json(3),
            INSIGHTS_JSON,
            INSIGHTS_JSON,
        ]));
        let owner = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, owner).await.unwrap();

        let done = h.engine.complete_session("unknown", owner, &[]).await.unwrap();
        assert_eq!(done.resolved_by, ResolutionStrategy::LatestForUser);
        assert_eq!(done.session_id, generated.session_id);

        let stranger = Uuid::new_v4();
        let done = h.engine.complete_session("unknown", stranger, &[]).await.unwrap();
        assert_eq!(done.resolved_by, ResolutionStrategy::LatestOverall);
    }

    #[tokio::test]
    async fn test_complete_without_any_session_is_not_found() {
        let h = Harness::new(ScriptedLlm::down());
        let err = h
            .engine
            .complete_session("missing", Uuid::new_v4(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound));
        assert_eq!(err.to_string(), "interview session not found");
    }

    #[tokio::test]
    async fn test_global_fallback_can_be_disabled() {
        let settings = EngineSettings {
            allow_global_session_fallback: false,
            ..EngineSettings::default()
        };
        let h = Harness::build(
            ScriptedLlm::replies(&[&questions_json(3)]),
            Arc::new(crate::activity::store::MemoryLedgerStore::new()),
            settings,
        );
        h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();

        let err = h
            .engine
            .complete_session("unknown", Uuid::new_v4(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_complete_survives_ledger_failure() {
        let h = Harness::build(
            ScriptedLlm::replies(&[&questions_json(3), INSIGHTS_JSON]),
            Arc::new(BrokenLedgerStore),
            EngineSettings::default(),
        );
        let user = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, user).await.unwrap();

        let done = h
            .engine
            .complete_session(&generated.session_id, user, &[])
            .await
            .unwrap();
        assert!(!done.heatmap_update.success);
        assert!(done.heatmap_update.error.is_some());
        assert!(done.persisted);
    }

    #[tokio::test]
    async fn test_complete_survives_mark_complete_failure() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(3), INSIGHTS_JSON]));
        let user = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, user).await.unwrap();
        h.store.fail_writes(true);

        let done = h
            .engine
            .complete_session(&generated.session_id, user, &[])
            .await
            .unwrap();
        assert!(!done.persisted);
        assert!(done.heatmap_update.success);
    }

    #[tokio::test]
    async fn test_recompleting_returns_stored_insights_once() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(3), INSIGHTS_JSON]));
        let user = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, user).await.unwrap();

        let first = h
            .engine
            .complete_session(&generated.session_id, user, &[])
            .await
            .unwrap();
        let second = h
            .engine
            .complete_session(&generated.session_id, user, &[])
            .await
            .unwrap();

        assert_eq!(second.insights, first.insights);
        assert!(!second.heatmap_update.recorded);
        assert_eq!(h.llm.calls(), 2);
        assert_eq!(h.ledger.stats(user).await.unwrap().stats.total_interviews, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_ignores_stray_indices() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(2), ANALYSIS_JSON]));
        let user = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, user).await.unwrap();
        h.engine.submit_answer(submission(&generated.session_id, 0)).await.unwrap();

        // rows written before indices were checked
        let stored = h.store.lookup(&generated.session_id).await.unwrap().unwrap();
        for index in [2, 7, usize::MAX] {
            let mut stray = stored.responses[0].clone();
            stray.question_index = index;
            h.store.append_response(&generated.session_id, &stray).await.unwrap();
        }

        let timings = [
            QuestionTiming {
                question_index: usize::MAX,
                time_spent_seconds: 30.0,
            },
            QuestionTiming {
                question_index: 0,
                time_spent_seconds: 12.0,
            },
        ];
        let done = h
            .engine
            .complete_session(&generated.session_id, user, &timings)
            .await
            .unwrap();

        assert_eq!(done.metrics.completed_questions, 1);
        assert_eq!(done.metrics.completion_rate, 50.0);
        assert_eq!(done.insights.question_analytics.len(), 1);
        assert_eq!(done.insights.question_analytics[0].time_spent_seconds, Some(12.0));

        let view = h.ledger.stats(user).await.unwrap();
        assert_eq!(view.stats.total_questions, 1);
    }

    #[test]
    fn test_timings_for_unknown_questions_are_dropped() {
        let mut insights: SessionInsights = serde_json::from_str(INSIGHTS_JSON).unwrap();
        let timings = [
            QuestionTiming {
                question_index: usize::MAX,
                time_spent_seconds: 30.0,
            },
            QuestionTiming {
                question_index: 1,
                time_spent_seconds: -4.0,
            },
        ];
        apply_timings(&mut insights, &timings);

        let spent: Vec<_> = insights
            .question_analytics
            .iter()
            .map(|qa| qa.time_spent_seconds)
            .collect();
        assert_eq!(spent, vec![None, Some(0.0)]);
    }

    // ─── history ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_session_stats_after_one_completed_of_two() {
        let h = Harness::new(ScriptedLlm::replies(&[
            &questions_json(4),
            &questions_json(2),
            ANALYSIS_JSON,
            INSIGHTS_JSON,
        ]));
        let user = Uuid::new_v4();
        let first = h.engine.generate_questions(JD, user).await.unwrap();
        h.engine.generate_questions(JD, user).await.unwrap();
        h.engine.submit_answer(submission(&first.session_id, 1)).await.unwrap();
        h.engine.complete_session(&first.session_id, user, &[]).await.unwrap();

        let summary = h.engine.session_stats(user).await.unwrap();
        assert_eq!(summary.total_sessions, 2);
        assert_eq!(summary.completed_sessions, 1);
        assert_eq!(summary.average_score, 8.0);
        assert_eq!(summary.total_questions, 6);
        assert_eq!(summary.total_responses, 1);
        assert_eq!(summary.completion_rate, 50.0);

        h.store.fail_reads(true);
        let err = h.engine.session_stats(user).await.unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
    }

    // ─── retries ───────────────────────────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let h = Harness::new(ScriptedLlm::new(vec![
            Err(LlmError::UpstreamUnavailable("timed out".into())),
            Ok(questions_json(15)),
        ]));
        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();
        assert!(!generated.used_fallback);
        assert_eq!(h.llm.calls(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let h = Harness::new(ScriptedLlm::new(vec![
            Err(LlmError::UpstreamAuthError("missing key".into())),
            Ok(questions_json(15)),
        ]));
        let generated = h.engine.generate_questions(JD, Uuid::new_v4()).await.unwrap();
        assert!(generated.used_fallback);
        assert_eq!(h.llm.calls(), 1);
    }

    // ─── history ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_get_and_delete_enforce_ownership() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(3)]));
        let owner = Uuid::new_v4();
        let generated = h.engine.generate_questions(JD, owner).await.unwrap();

        let other = Uuid::new_v4();
        assert!(matches!(
            h.engine.get_session(&generated.session_id, other).await,
            Err(EngineError::Forbidden(_))
        ));
        assert!(matches!(
            h.engine.delete_session(&generated.session_id, other).await,
            Err(EngineError::Forbidden(_))
        ));

        h.engine.delete_session(&generated.session_id, owner).await.unwrap();
        assert!(matches!(
            h.engine.get_session(&generated.session_id, owner).await,
            Err(EngineError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_sessions_clamps_limit() {
        let h = Harness::new(ScriptedLlm::replies(&[&questions_json(3), &questions_json(3)]));
        let user = Uuid::new_v4();
        h.engine.generate_questions(JD, user).await.unwrap();
        h.engine.generate_questions(JD, user).await.unwrap();

        let page = h.engine.list_sessions(user, 0, 0, None).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.sessions.len(), 1);
    }
}
