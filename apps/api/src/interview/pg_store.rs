use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::interview::models::{
    InterviewSession, SessionInsights, SessionMetrics, SessionResponse, SessionStatus,
    UserSessionSummary,
};
use crate::interview::store::{SessionPage, SessionStore, StoreError};
use crate::models::session::{InterviewResponseRow, InterviewSessionRow, SessionSummaryRow};

/// Postgres-backed session store. Responses live in their own table keyed by
/// `(session_id, question_index)` so a replayed submission is an upsert.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn responses_for(
        &self,
        session_ids: &[String],
    ) -> Result<HashMap<String, Vec<InterviewResponseRow>>, StoreError> {
        let rows = sqlx::query_as::<_, InterviewResponseRow>(
            r#"
            SELECT session_id, question_index, question, answer, audio_metrics, analysis, submitted_at
            FROM interview_responses
            WHERE session_id = ANY($1)
            ORDER BY submitted_at ASC
            "#,
        )
        .bind(session_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<String, Vec<InterviewResponseRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.session_id.clone()).or_default().push(row);
        }
        Ok(grouped)
    }

    async fn hydrate(
        &self,
        rows: Vec<InterviewSessionRow>,
    ) -> Result<Vec<InterviewSession>, StoreError> {
        let ids: Vec<String> = rows.iter().map(|r| r.session_id.clone()).collect();
        let mut responses = self.responses_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let own = responses.remove(&row.session_id).unwrap_or_default();
                into_session(row, own)
            })
            .collect()
    }

    async fn hydrate_one(
        &self,
        row: Option<InterviewSessionRow>,
    ) -> Result<Option<InterviewSession>, StoreError> {
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

const SESSION_COLUMNS: &str = "session_id, user_id, job_description, questions, status, \
     session_metrics, insights, created_at, completed_at";

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create(&self, session: &InterviewSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO interview_sessions
                (session_id, user_id, job_description, questions, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&session.session_id)
        .bind(session.user_id)
        .bind(&session.job_description)
        .bind(serde_json::to_value(&session.questions)?)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Stored interview session {}", session.session_id);
        Ok(())
    }

    async fn append_response(
        &self,
        session_id: &str,
        response: &SessionResponse,
    ) -> Result<(), StoreError> {
        let question_index = i32::try_from(response.question_index).map_err(|_| {
            StoreError::Persist(format!(
                "question index {} out of range",
                response.question_index
            ))
        })?;
        let audio_metrics = response
            .audio_metrics
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO interview_responses
                (session_id, question_index, question, answer, audio_metrics, analysis, submitted_at)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE EXISTS (SELECT 1 FROM interview_sessions WHERE session_id = $1)
            ON CONFLICT (session_id, question_index) DO UPDATE
            SET question = EXCLUDED.question,
                answer = EXCLUDED.answer,
                audio_metrics = EXCLUDED.audio_metrics,
                analysis = EXCLUDED.analysis,
                submitted_at = EXCLUDED.submitted_at
            "#,
        )
        .bind(session_id)
        .bind(question_index)
        .bind(&response.question)
        .bind(&response.answer)
        .bind(audio_metrics)
        .bind(serde_json::to_value(&response.analysis)?)
        .bind(response.timestamp)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    async fn lookup(&self, session_id: &str) -> Result<Option<InterviewSession>, StoreError> {
        let row = sqlx::query_as::<_, InterviewSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM interview_sessions WHERE session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        self.hydrate_one(row).await
    }

    async fn lookup_by_user(&self, user_id: Uuid) -> Result<Option<InterviewSession>, StoreError> {
        let row = sqlx::query_as::<_, InterviewSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM interview_sessions \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        self.hydrate_one(row).await
    }

    async fn lookup_most_recent_any(&self) -> Result<Option<InterviewSession>, StoreError> {
        let row = sqlx::query_as::<_, InterviewSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM interview_sessions ORDER BY created_at DESC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        self.hydrate_one(row).await
    }

    async fn mark_complete(
        &self,
        session_id: &str,
        metrics: &SessionMetrics,
        insights: &SessionInsights,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE interview_sessions
            SET status = $2, session_metrics = $3, insights = $4, completed_at = $5
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .bind(SessionStatus::Completed.as_str())
        .bind(serde_json::to_value(metrics)?)
        .bind(serde_json::to_value(insights)?)
        .bind(completed_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
        status: Option<SessionStatus>,
    ) -> Result<SessionPage, StoreError> {
        let status = status.map(|s| s.as_str());
        let offset = i64::from(page.max(1) - 1) * i64::from(limit);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM interview_sessions \
             WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, InterviewSessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM interview_sessions \
             WHERE user_id = $1 AND ($2::text IS NULL OR status = $2) \
             ORDER BY created_at DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(status)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(SessionPage {
            sessions: self.hydrate(rows).await?,
            total: total.max(0) as u64,
        })
    }

    async fn user_summary(&self, user_id: Uuid) -> Result<UserSessionSummary, StoreError> {
        let row = sqlx::query_as::<_, SessionSummaryRow>(
            "SELECT COUNT(*) AS total_sessions, \
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed_sessions, \
                    AVG((session_metrics->>'averageScore')::float8) AS average_score, \
                    COALESCE(SUM(jsonb_array_length(questions)), 0)::int8 AS total_questions, \
                    (SELECT COUNT(*) FROM interview_responses r \
                       JOIN interview_sessions s USING (session_id) \
                      WHERE s.user_id = $1) AS total_responses \
             FROM interview_sessions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(UserSessionSummary::from_counts(
            row.total_sessions.max(0) as u64,
            row.completed_sessions.max(0) as u64,
            row.average_score,
            row.total_questions.max(0) as u64,
            row.total_responses.max(0) as u64,
        ))
    }

    async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
        // interview_responses cascades
        let result = sqlx::query("DELETE FROM interview_sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(session_id.to_string()));
        }
        Ok(())
    }
}

fn into_session(
    row: InterviewSessionRow,
    responses: Vec<InterviewResponseRow>,
) -> Result<InterviewSession, StoreError> {
    let status = SessionStatus::parse(&row.status)
        .ok_or_else(|| StoreError::Persist(format!("unknown session status '{}'", row.status)))?;

    let responses = responses
        .into_iter()
        .map(|r| -> Result<SessionResponse, StoreError> {
            Ok(SessionResponse {
                question_index: r.question_index.max(0) as usize,
                question: r.question,
                answer: r.answer,
                audio_metrics: r.audio_metrics.map(serde_json::from_value).transpose()?,
                analysis: serde_json::from_value(r.analysis)?,
                timestamp: r.submitted_at,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(InterviewSession {
        session_id: row.session_id,
        user_id: row.user_id,
        job_description: row.job_description,
        questions: serde_json::from_value(row.questions)?,
        responses,
        status,
        session_metrics: row.session_metrics.map(serde_json::from_value).transpose()?,
        insights: row.insights.map(serde_json::from_value).transpose()?,
        created_at: row.created_at,
        completed_at: row.completed_at,
    })
}
