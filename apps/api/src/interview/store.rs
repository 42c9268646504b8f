//! Session persistence seam.
//!
//! Lookups never mutate. `append_response` and `mark_complete` can be replayed:
//! a second identical write leaves the same state as the first.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::interview::models::{
    InterviewSession, SessionInsights, SessionMetrics, SessionResponse, SessionStatus,
    UserSessionSummary,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persist(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Persist(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Persist(format!("corrupt stored document: {e}"))
    }
}

/// One page of a user's session history.
#[derive(Debug, Clone)]
pub struct SessionPage {
    pub sessions: Vec<InterviewSession>,
    pub total: u64,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &InterviewSession) -> Result<(), StoreError>;

    /// Replaces any stored response with the same `question_index`.
    async fn append_response(
        &self,
        session_id: &str,
        response: &SessionResponse,
    ) -> Result<(), StoreError>;

    async fn lookup(&self, session_id: &str) -> Result<Option<InterviewSession>, StoreError>;

    /// Most recently created session of `user_id`, any status.
    async fn lookup_by_user(&self, user_id: Uuid) -> Result<Option<InterviewSession>, StoreError>;

    /// Most recently created session of any user.
    async fn lookup_most_recent_any(&self) -> Result<Option<InterviewSession>, StoreError>;

    async fn mark_complete(
        &self,
        session_id: &str,
        metrics: &SessionMetrics,
        insights: &SessionInsights,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Newest first. `page` starts at 1.
    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
        status: Option<SessionStatus>,
    ) -> Result<SessionPage, StoreError>;

    /// Totals over every session of `user_id`, any status.
    async fn user_summary(&self, user_id: Uuid) -> Result<UserSessionSummary, StoreError>;

    async fn delete(&self, session_id: &str) -> Result<(), StoreError>;
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

/// Process-local store used when no database is configured.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, InterviewSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest(sessions: impl Iterator<Item = InterviewSession>) -> Option<InterviewSession> {
        sessions.max_by_key(|s| s.created_at)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, session: &InterviewSession) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }

    async fn append_response(
        &self,
        session_id: &str,
        response: &SessionResponse,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        session.upsert_response(response.clone());
        Ok(())
    }

    async fn lookup(&self, session_id: &str) -> Result<Option<InterviewSession>, StoreError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn lookup_by_user(&self, user_id: Uuid) -> Result<Option<InterviewSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(Self::newest(
            sessions.values().filter(|s| s.user_id == user_id).cloned(),
        ))
    }

    async fn lookup_most_recent_any(&self) -> Result<Option<InterviewSession>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(Self::newest(sessions.values().cloned()))
    }

    async fn mark_complete(
        &self,
        session_id: &str,
        metrics: &SessionMetrics,
        insights: &SessionInsights,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        session.status = SessionStatus::Completed;
        session.session_metrics = Some(metrics.clone());
        session.insights = Some(insights.clone());
        session.completed_at = Some(completed_at);
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
        status: Option<SessionStatus>,
    ) -> Result<SessionPage, StoreError> {
        let sessions = self.sessions.read().await;
        let mut matching: Vec<InterviewSession> = sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .filter(|s| status.map_or(true, |st| s.status == st))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let offset = (page.max(1) as usize - 1) * limit as usize;
        let sessions = matching
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok(SessionPage { sessions, total })
    }

    async fn user_summary(&self, user_id: Uuid) -> Result<UserSessionSummary, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(UserSessionSummary::from_sessions(
            sessions.values().filter(|s| s.user_id == user_id),
        ))
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::fallback::{fallback_analysis, fallback_insights};
    use chrono::{Duration, TimeZone};

    fn session(id: &str, user_id: Uuid, minutes_after: i64) -> InterviewSession {
        let created = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
            + Duration::minutes(minutes_after);
        InterviewSession::new(
            id.to_string(),
            user_id,
            "Backend engineer".to_string(),
            vec!["Q1".into(), "Q2".into(), "Q3".into()],
            created,
        )
    }

    fn response(index: usize, answer: &str) -> SessionResponse {
        SessionResponse {
            question_index: index,
            question: format!("Q{}", index + 1),
            answer: answer.to_string(),
            audio_metrics: None,
            analysis: fallback_analysis(answer),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_is_last_write_wins() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        store.create(&session("a", user, 0)).await.unwrap();

        store.append_response("a", &response(0, "first try")).await.unwrap();
        store.append_response("a", &response(0, "second try")).await.unwrap();
        store.append_response("a", &response(0, "second try")).await.unwrap();

        let stored = store.lookup("a").await.unwrap().unwrap();
        assert_eq!(stored.responses.len(), 1);
        assert_eq!(stored.responses[0].answer, "second try");
    }

    #[tokio::test]
    async fn test_append_to_unknown_session_is_not_found() {
        let store = MemorySessionStore::new();
        let err = store
            .append_response("missing", &response(0, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_lookup_by_user_and_global_return_newest() {
        let store = MemorySessionStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        store.create(&session("old", alice, 0)).await.unwrap();
        store.create(&session("new", alice, 10)).await.unwrap();
        store.create(&session("bob", bob, 20)).await.unwrap();

        let by_user = store.lookup_by_user(alice).await.unwrap().unwrap();
        assert_eq!(by_user.session_id, "new");

        let any = store.lookup_most_recent_any().await.unwrap().unwrap();
        assert_eq!(any.session_id, "bob");

        assert!(store.lookup_by_user(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_complete_sets_status_and_payloads() {
        let store = MemorySessionStore::new();
        let s = session("a", Uuid::new_v4(), 0);
        store.create(&s).await.unwrap();

        let metrics = s.compute_metrics(s.created_at + Duration::minutes(12));
        let insights = fallback_insights(&s, &metrics);
        let done_at = s.created_at + Duration::minutes(12);
        store.mark_complete("a", &metrics, &insights, done_at).await.unwrap();
        store.mark_complete("a", &metrics, &insights, done_at).await.unwrap();

        let stored = store.lookup("a").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.session_metrics, Some(metrics));
        assert_eq!(stored.completed_at, Some(done_at));
    }

    #[tokio::test]
    async fn test_list_by_user_paginates_newest_first() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        for i in 0..5 {
            store.create(&session(&format!("s{i}"), user, i)).await.unwrap();
        }
        store.create(&session("other", Uuid::new_v4(), 99)).await.unwrap();

        let first = store.list_by_user(user, 1, 2, None).await.unwrap();
        assert_eq!(first.total, 5);
        let ids: Vec<_> = first.sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s4", "s3"]);

        let last = store.list_by_user(user, 3, 2, None).await.unwrap();
        assert_eq!(last.sessions.len(), 1);
        assert_eq!(last.sessions[0].session_id, "s0");

        let completed = store
            .list_by_user(user, 1, 10, Some(SessionStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.total, 0);
    }

    #[tokio::test]
    async fn test_user_summary_totals() {
        let store = MemorySessionStore::new();
        let user = Uuid::new_v4();
        for id in ["a", "b", "c"] {
            store.create(&session(id, user, 0)).await.unwrap();
        }
        store.create(&session("other", Uuid::new_v4(), 0)).await.unwrap();
        store.append_response("a", &response(0, "first answer")).await.unwrap();
        store.append_response("a", &response(1, "second answer")).await.unwrap();
        store.append_response("b", &response(0, "only answer")).await.unwrap();

        let done_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap();
        for (id, average) in [("a", 8.0), ("b", 6.0)] {
            let s = store.lookup(id).await.unwrap().unwrap();
            let mut metrics = s.compute_metrics(done_at);
            metrics.average_score = average;
            let insights = fallback_insights(&s, &metrics);
            store.mark_complete(id, &metrics, &insights, done_at).await.unwrap();
        }

        let summary = store.user_summary(user).await.unwrap();
        assert_eq!(summary.total_sessions, 3);
        assert_eq!(summary.completed_sessions, 2);
        assert_eq!(summary.average_score, 7.0);
        assert_eq!(summary.total_questions, 9);
        assert_eq!(summary.total_responses, 3);
        assert!((summary.completion_rate - 200.0 / 3.0).abs() < 1e-9);

        let empty = store.user_summary(Uuid::new_v4()).await.unwrap();
        assert_eq!(empty, UserSessionSummary::default());
    }

    #[tokio::test]
    async fn test_delete_removes_session() {
        let store = MemorySessionStore::new();
        store.create(&session("a", Uuid::new_v4(), 0)).await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.lookup("a").await.unwrap().is_none());
        assert!(matches!(store.delete("a").await, Err(StoreError::NotFound(_))));
    }
}
