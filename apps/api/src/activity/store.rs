use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::activity::models::{Contribution, UserStats};
use crate::interview::store::StoreError;

/// Storage for the per-user ledger. Callers serialise writes per user.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load_day(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Contribution>, StoreError>;

    /// Inclusive range, ascending by date.
    async fn load_range(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Contribution>, StoreError>;

    async fn load_all(&self, user_id: Uuid) -> Result<Vec<Contribution>, StoreError>;

    async fn load_stats(&self, user_id: Uuid) -> Result<Option<UserStats>, StoreError>;

    /// Writes the day record and the stats that include it as one unit.
    async fn commit(
        &self,
        user_id: Uuid,
        day: &Contribution,
        stats: &UserStats,
    ) -> Result<(), StoreError>;

    async fn save_stats(&self, user_id: Uuid, stats: &UserStats) -> Result<(), StoreError>;
}

#[derive(Default)]
struct UserLedger {
    days: BTreeMap<NaiveDate, Contribution>,
    stats: Option<UserStats>,
}

#[derive(Default)]
pub struct MemoryLedgerStore {
    users: RwLock<HashMap<Uuid, UserLedger>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn load_day(
        &self,
        user_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<Contribution>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(&user_id)
            .and_then(|ledger| ledger.days.get(&date))
            .cloned())
    }

    async fn load_range(
        &self,
        user_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Contribution>, StoreError> {
        if start > end {
            return Ok(Vec::new());
        }
        let users = self.users.read().await;
        Ok(users
            .get(&user_id)
            .map(|ledger| ledger.days.range(start..=end).map(|(_, c)| c.clone()).collect())
            .unwrap_or_default())
    }

    async fn load_all(&self, user_id: Uuid) -> Result<Vec<Contribution>, StoreError> {
        let users = self.users.read().await;
        Ok(users
            .get(&user_id)
            .map(|ledger| ledger.days.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn load_stats(&self, user_id: Uuid) -> Result<Option<UserStats>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&user_id).and_then(|ledger| ledger.stats.clone()))
    }

    async fn commit(
        &self,
        user_id: Uuid,
        day: &Contribution,
        stats: &UserStats,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let ledger = users.entry(user_id).or_default();
        ledger.days.insert(day.date, day.clone());
        ledger.stats = Some(stats.clone());
        Ok(())
    }

    async fn save_stats(&self, user_id: Uuid, stats: &UserStats) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users.entry(user_id).or_default().stats = Some(stats.clone());
        Ok(())
    }
}
