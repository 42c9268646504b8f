use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::activity::models::{Contribution, UserStats};
use crate::activity::store::LedgerStore;
use crate::interview::store::StoreError;
use crate::models::activity::{ActivityDayRow, UserStatsRow};

/// Postgres ledger: one `activity_days` row per user and local day, one
/// `user_stats` row per user. `commit` writes both in a single transaction.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn upsert_stats(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    stats: &UserStats,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO user_stats (user_id, stats, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (user_id) DO UPDATE
        SET stats = EXCLUDED.stats, updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(serde_json::to_value(stats)?)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn load_day(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Contribution>, StoreError> {
        let row = sqlx::query_as::<_, ActivityDayRow>(
            "SELECT user_id, day, count, activities FROM activity_days WHERE user_id = $1 AND day = $2",
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        row.map(into_contribution).transpose()
    }

    async fn load_range(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Contribution>, StoreError> {
        let rows = sqlx::query_as::<_, ActivityDayRow>(
            r#"
            SELECT user_id, day, count, activities FROM activity_days
            WHERE user_id = $1 AND day BETWEEN $2 AND $3
            ORDER BY day ASC
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_contribution).collect()
    }

    async fn load_all(&self, user_id: Uuid) -> Result<Vec<Contribution>, StoreError> {
        let rows = sqlx::query_as::<_, ActivityDayRow>(
            "SELECT user_id, day, count, activities FROM activity_days WHERE user_id = $1 ORDER BY day ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(into_contribution).collect()
    }

    async fn load_stats(&self, user_id: Uuid) -> Result<Option<UserStats>, StoreError> {
        let row = sqlx::query_as::<_, UserStatsRow>(
            "SELECT user_id, stats, updated_at FROM user_stats WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| serde_json::from_value(r.stats)).transpose()?)
    }

    async fn commit(
        &self,
        user_id: Uuid,
        day: &Contribution,
        stats: &UserStats,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO activity_days (user_id, day, count, activities)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, day) DO UPDATE
            SET count = EXCLUDED.count, activities = EXCLUDED.activities
            "#,
        )
        .bind(user_id)
        .bind(day.date)
        .bind(day.count as i32)
        .bind(serde_json::to_value(&day.activities)?)
        .execute(&mut *tx)
        .await?;

        upsert_stats(&mut tx, user_id, stats).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn save_stats(&self, user_id: Uuid, stats: &UserStats) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        upsert_stats(&mut tx, user_id, stats).await?;
        tx.commit().await?;
        Ok(())
    }
}

fn into_contribution(row: ActivityDayRow) -> Result<Contribution, StoreError> {
    let activities: Vec<_> = serde_json::from_value(row.activities)?;
    Ok(Contribution {
        date: row.day,
        count: activities.len() as u32,
        activities,
    })
}
