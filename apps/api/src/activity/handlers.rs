//! Axum route handlers for the Activity API.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::ledger::{ActivityRecorded, StatsView};
use crate::activity::models::{ActivityMetadata, ActivityType, Contribution, UserStats};
use crate::errors::AppError;
use crate::state::AppState;

/// Heatmap window when the caller gives no start date.
const DEFAULT_HEATMAP_DAYS: i64 = 365;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordActivityRequest {
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: ActivityMetadata,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapQuery {
    pub user_id: Uuid,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapResponse {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_activities: u32,
    pub contributions: Vec<Contribution>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecomputeRequest {
    pub user_id: Uuid,
}

/// POST /api/v1/activity
pub async fn handle_record_activity(
    State(state): State<AppState>,
    Json(request): Json<RecordActivityRequest>,
) -> Result<Json<ActivityRecorded>, AppError> {
    if request.activity_type.trim().is_empty() {
        return Err(AppError::Validation(
            "Activity type is required".to_string(),
        ));
    }
    request.metadata.validate().map_err(AppError::Validation)?;

    let recorded = state
        .ledger
        .record_activity(
            request.user_id,
            ActivityType::from(request.activity_type.trim().to_string()),
            request.description,
            request.metadata,
        )
        .await?;
    Ok(Json(recorded))
}

/// GET /api/v1/activity/heatmap?userId=&startDate=&endDate=
///
/// Defaults to the year ending today in the ledger's local calendar.
pub async fn handle_heatmap(
    State(state): State<AppState>,
    Query(query): Query<HeatmapQuery>,
) -> Result<Json<HeatmapResponse>, AppError> {
    let end_date = query.end_date.unwrap_or_else(|| state.ledger.today());
    let start_date = query
        .start_date
        .unwrap_or(end_date - Duration::days(DEFAULT_HEATMAP_DAYS - 1));

    let contributions = state
        .ledger
        .get_activity(query.user_id, start_date, end_date)
        .await?;

    Ok(Json(HeatmapResponse {
        start_date,
        end_date,
        total_activities: contributions.iter().map(|c| c.count).sum(),
        contributions,
    }))
}

/// GET /api/v1/activity/stats?userId=
pub async fn handle_stats(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<StatsView>, AppError> {
    Ok(Json(state.ledger.stats(query.user_id).await?))
}

/// POST /api/v1/activity/stats/recompute
pub async fn handle_recompute_stats(
    State(state): State<AppState>,
    Json(request): Json<RecomputeRequest>,
) -> Result<Json<UserStats>, AppError> {
    Ok(Json(state.ledger.recompute_stats(request.user_id).await?))
}
