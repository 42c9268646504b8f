use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewSessionRow {
    pub session_id: String,
    pub user_id: Uuid,
    pub job_description: String,
    pub questions: Value,
    pub status: String,
    pub session_metrics: Option<Value>,
    pub insights: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewResponseRow {
    pub session_id: String,
    pub question_index: i32,
    pub question: String,
    pub answer: String,
    pub audio_metrics: Option<Value>,
    pub analysis: Value,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SessionSummaryRow {
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub average_score: Option<f64>,
    pub total_questions: i64,
    pub total_responses: i64,
}
