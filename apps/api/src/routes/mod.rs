pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::activity::handlers as activity;
use crate::interview::handlers as interview;
use crate::state::AppState;
use crate::transcription::MAX_AUDIO_BYTES;

/// Room for the multipart framing around a maximum-size recording.
const UPLOAD_BODY_LIMIT: usize = MAX_AUDIO_BYTES + 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Interview API
        .route(
            "/api/v1/interview/generate-questions",
            post(interview::handle_generate_questions),
        )
        .route(
            "/api/v1/interview/generate-questions/upload",
            post(interview::handle_generate_questions_upload)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/v1/interview/analyze-answer",
            post(interview::handle_analyze_answer),
        )
        .route(
            "/api/v1/interview/transcribe",
            post(interview::handle_transcribe).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/api/v1/interview/complete-session",
            post(interview::handle_complete_session),
        )
        .route(
            "/api/v1/interview/sessions",
            get(interview::handle_list_sessions),
        )
        .route(
            "/api/v1/interview/stats",
            get(interview::handle_session_stats),
        )
        .route(
            "/api/v1/interview/sessions/:id",
            get(interview::handle_get_session).delete(interview::handle_delete_session),
        )
        // Activity API
        .route("/api/v1/activity", post(activity::handle_record_activity))
        .route("/api/v1/activity/heatmap", get(activity::handle_heatmap))
        .route("/api/v1/activity/stats", get(activity::handle_stats))
        .route(
            "/api/v1/activity/stats/recompute",
            post(activity::handle_recompute_stats),
        )
        .with_state(state)
}
