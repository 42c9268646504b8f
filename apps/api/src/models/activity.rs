use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityDayRow {
    pub user_id: Uuid,
    pub day: NaiveDate,
    pub count: i32,
    pub activities: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserStatsRow {
    pub user_id: Uuid,
    pub stats: Value,
    pub updated_at: DateTime<Utc>,
}
