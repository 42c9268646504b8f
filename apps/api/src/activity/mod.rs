// Activity ledger: per-day contribution log per user and the gamified stats
// derived from it (XP, levels, streaks, score trend).

pub mod handlers;
pub mod ledger;
pub mod models;
pub mod pg_store;
pub mod reducer;
pub mod store;
