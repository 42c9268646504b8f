//! Axum route handlers for the Interview API.

use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::engine::{
    AnswerSubmission, CompletedSession, GeneratedQuestions, SubmittedAnswer,
};
use crate::interview::models::{
    AudioMetrics, InterviewSession, QuestionTiming, SessionStatus, UserSessionSummary,
};
use crate::state::AppState;
use crate::transcription::{audio_metrics, validate_recording};

const DEFAULT_PAGE_SIZE: u32 = 10;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuestionsRequest {
    pub user_id: Uuid,
    pub job_description: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeAnswerRequest {
    pub session_id: String,
    pub question_index: usize,
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub audio_metrics: Option<AudioMetrics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSessionRequest {
    pub session_id: String,
    pub user_id: Uuid,
    #[serde(default)]
    pub question_timings: Vec<QuestionTiming>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeResponse {
    pub transcription: String,
    pub audio_metrics: AudioMetrics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
    pub user_id: Uuid,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<InterviewSession>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/interview/generate-questions
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    Json(request): Json<GenerateQuestionsRequest>,
) -> Result<Json<GeneratedQuestions>, AppError> {
    let generated = state
        .engine
        .generate_questions(&request.job_description, request.user_id)
        .await?;
    Ok(Json(generated))
}

/// POST /api/v1/interview/generate-questions/upload
///
/// Multipart form with `userId` and either a `jobDescription` text field or a
/// `jobDescriptionFile` PDF. The PDF wins when both are present.
pub async fn handle_generate_questions_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<GeneratedQuestions>, AppError> {
    let mut user_id = None;
    let mut text = None;
    let mut pdf: Option<Bytes> = None;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "userId" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                user_id = Some(
                    Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::Validation("userId must be a UUID".to_string()))?,
                );
            }
            "jobDescription" => text = Some(field.text().await.map_err(bad_multipart)?),
            "jobDescriptionFile" => pdf = Some(field.bytes().await.map_err(bad_multipart)?),
            _ => {}
        }
    }

    let user_id = user_id.ok_or_else(|| AppError::Validation("userId is required".to_string()))?;
    let job_description = match pdf {
        Some(bytes) => extract_pdf_text(bytes).await?,
        None => text.unwrap_or_default(),
    };

    let generated = state
        .engine
        .generate_questions(&job_description, user_id)
        .await?;
    Ok(Json(generated))
}

/// POST /api/v1/interview/analyze-answer
pub async fn handle_analyze_answer(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeAnswerRequest>,
) -> Result<Json<SubmittedAnswer>, AppError> {
    let submitted = state
        .engine
        .submit_answer(AnswerSubmission {
            session_id: request.session_id,
            question_index: request.question_index,
            question: request.question,
            answer: request.answer,
            audio_metrics: request.audio_metrics,
        })
        .await?;
    Ok(Json(submitted))
}

/// POST /api/v1/interview/transcribe
///
/// Multipart form with an `audio` file and its `duration` in seconds.
pub async fn handle_transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, AppError> {
    let transcriber = state.transcriber.clone().ok_or(AppError::NotImplemented)?;

    let mut audio = Bytes::new();
    let mut content_type = "application/octet-stream".to_string();
    let mut duration = 0.0_f64;

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio" => {
                if let Some(ct) = field.content_type() {
                    content_type = ct.to_string();
                }
                audio = field.bytes().await.map_err(bad_multipart)?;
            }
            "duration" => {
                let raw = field.text().await.map_err(bad_multipart)?;
                duration = raw.trim().parse().map_err(|_| {
                    AppError::Validation("duration must be a number of seconds".to_string())
                })?;
            }
            _ => {}
        }
    }

    validate_recording(&audio, duration)?;
    let size = audio.len();
    let transcription = transcriber.transcribe(audio, &content_type).await?;
    info!("Transcribed {size} bytes of {content_type} ({duration:.1}s)");

    Ok(Json(TranscribeResponse {
        audio_metrics: audio_metrics(&transcription, duration),
        transcription,
    }))
}

/// POST /api/v1/interview/complete-session
pub async fn handle_complete_session(
    State(state): State<AppState>,
    Json(request): Json<CompleteSessionRequest>,
) -> Result<Json<CompletedSession>, AppError> {
    let completed = state
        .engine
        .complete_session(
            &request.session_id,
            request.user_id,
            &request.question_timings,
        )
        .await?;
    Ok(Json(completed))
}

/// GET /api/v1/interview/sessions?userId=&page=&limit=&status=
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> Result<Json<ListSessionsResponse>, AppError> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(SessionStatus::parse(raw).ok_or_else(|| {
            AppError::Validation(format!("Unknown session status '{raw}'"))
        })?),
    };
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, crate::interview::engine::MAX_PAGE_SIZE);

    let result = state
        .engine
        .list_sessions(query.user_id, page, limit, status)
        .await?;

    Ok(Json(ListSessionsResponse {
        sessions: result.sessions,
        pagination: Pagination {
            page,
            limit,
            total: result.total,
            total_pages: result.total.div_ceil(u64::from(limit)),
        },
    }))
}

/// GET /api/v1/interview/stats?userId=
pub async fn handle_session_stats(
    State(state): State<AppState>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<UserSessionSummary>, AppError> {
    Ok(Json(state.engine.session_stats(owner.user_id).await?))
}

/// GET /api/v1/interview/sessions/:id?userId=
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<InterviewSession>, AppError> {
    let session = state.engine.get_session(&session_id, owner.user_id).await?;
    Ok(Json(session))
}

/// DELETE /api/v1/interview/sessions/:id?userId=
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(owner): Query<OwnerQuery>,
) -> Result<Json<DeletedResponse>, AppError> {
    state.engine.delete_session(&session_id, owner.user_id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::Validation(format!("Malformed multipart body: {e}"))
}

/// PDF parsing is CPU-bound, so it runs off the async workers.
async fn extract_pdf_text(bytes: Bytes) -> Result<String, AppError> {
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(|e| {
            warn!("Could not read job description PDF: {e}");
            AppError::Validation("Could not read text from the uploaded PDF".to_string())
        })?;

    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "The uploaded PDF contains no extractable text".to_string(),
        ));
    }
    Ok(text)
}
