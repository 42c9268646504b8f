use async_trait::async_trait;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::models::resume::ResumeRow;

/// Source of the candidate's resume text for question generation.
#[async_trait]
pub trait ResumeProvider: Send + Sync {
    /// Text of the most recent resume, or an empty string when there is none or
    /// it cannot be read. Never fails.
    async fn latest_resume_text(&self, user_id: Uuid) -> String;
}

/// Used when no resume storage is configured.
pub struct NoResume;

#[async_trait]
impl ResumeProvider for NoResume {
    async fn latest_resume_text(&self, _user_id: Uuid) -> String {
        String::new()
    }
}

#[derive(Clone)]
pub struct PgResumeProvider {
    pool: PgPool,
}

impl PgResumeProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResumeProvider for PgResumeProvider {
    async fn latest_resume_text(&self, user_id: Uuid) -> String {
        let row = sqlx::query_as::<_, ResumeRow>(
            r#"
            SELECT id, user_id, file_name, extracted_text, created_at
            FROM resumes
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(Some(resume)) => resume.extracted_text,
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Could not load resume for user {user_id}: {e}");
                String::new()
            }
        }
    }
}
