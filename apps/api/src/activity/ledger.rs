//! Append-only per-day activity log per user, plus the derived stats.
//!
//! Writes for one user go through a per-user lock so the read-modify-write on
//! the day record and the stats never loses an update. Different users never
//! contend.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::activity::models::{Activity, ActivityMetadata, ActivityType, Contribution, UserStats};
use crate::activity::reducer::{self, StatsPolicy};
use crate::activity::store::LedgerStore;
use crate::clock::Clock;
use crate::interview::store::StoreError;
use crate::sync::KeyedLocks;

const LOCK_PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecorded {
    pub contribution_added: bool,
    pub new_contribution: bool,
    pub date: NaiveDate,
    pub activity: Activity,
    pub updated_stats: UserStats,
}

/// Stored stats plus the values that depend on today's date.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    #[serde(flatten)]
    pub stats: UserStats,
    pub live_streak: u32,
    pub weekly_interviews: u32,
}

pub struct ActivityLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<Uuid>,
    offset: FixedOffset,
    policy: StatsPolicy,
}

impl ActivityLedger {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        offset: FixedOffset,
        policy: StatsPolicy,
    ) -> Self {
        Self {
            store,
            clock,
            locks: KeyedLocks::new(),
            offset,
            policy,
        }
    }

    /// Local calendar day of `instant`.
    pub fn date_key(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.date_key(self.clock.now())
    }

    pub async fn record_activity(
        &self,
        user_id: Uuid,
        activity_type: ActivityType,
        description: Option<String>,
        metadata: ActivityMetadata,
    ) -> Result<ActivityRecorded, LedgerError> {
        let lock = self.locks.get(&user_id);
        let recorded = {
            let _guard = lock.lock().await;

            let now = self.clock.now();
            let date = self.date_key(now);
            let activity = Activity {
                description: description
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| activity_type.default_description()),
                activity_type,
                timestamp: now,
                metadata,
            };

            let existing = self.store.load_day(user_id, date).await?;
            let new_contribution = existing.is_none();
            let mut day = existing.unwrap_or_else(|| Contribution::empty(date));
            day.push(activity.clone());

            let mut stats = self.store.load_stats(user_id).await?.unwrap_or_default();
            reducer::apply_activity(&mut stats, date, &activity, &self.policy);

            self.store.commit(user_id, &day, &stats).await?;

            info!(
                "Recorded {} for user {user_id} on {date} (xp {}, level {}, streak {})",
                activity.activity_type.as_str(),
                stats.experience_points,
                stats.level,
                stats.current_streak
            );

            ActivityRecorded {
                contribution_added: true,
                new_contribution,
                date,
                activity,
                updated_stats: stats,
            }
        };
        drop(lock);

        if self.locks.len() > LOCK_PRUNE_THRESHOLD {
            let pruned = self.locks.prune_idle();
            debug!("Pruned {pruned} idle ledger locks");
        }

        Ok(recorded)
    }

    /// Daily records in `[start, end]`, ascending.
    pub async fn get_activity(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Contribution>, LedgerError> {
        if start > end {
            return Err(LedgerError::InvalidRange { start, end });
        }
        Ok(self.store.load_range(user_id, start, end).await?)
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<StatsView, LedgerError> {
        let today = self.today();
        let stats = self.store.load_stats(user_id).await?.unwrap_or_default();
        let week = self
            .store
            .load_range(user_id, today - Duration::days(6), today)
            .await?;

        Ok(StatsView {
            live_streak: reducer::live_streak(&stats, today),
            weekly_interviews: reducer::weekly_interviews(&week, today),
            stats,
        })
    }

    /// Rebuilds stats from the full log and stores the result.
    pub async fn recompute_stats(&self, user_id: Uuid) -> Result<UserStats, LedgerError> {
        let lock = self.locks.get(&user_id);
        let _guard = lock.lock().await;

        let log = self.store.load_all(user_id).await?;
        let stats = reducer::fold(&log, &self.policy);
        self.store.save_stats(user_id, &stats).await?;

        info!(
            "Recomputed stats for user {user_id} from {} day(s) of activity",
            log.len()
        );
        Ok(stats)
    }
}
