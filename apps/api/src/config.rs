use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::FixedOffset;

use crate::activity::reducer::StatsPolicy;
use crate::interview::engine::EngineSettings;
use crate::llm_client::CallBudget;

/// Application configuration loaded from environment variables.
/// Only numeric parse failures abort startup; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// When unset the service runs on in-memory stores.
    pub database_url: Option<String>,
    pub anthropic_api_key: String,
    pub llm_model: String,
    pub llm_analysis_timeout_secs: u64,
    pub llm_bulk_timeout_secs: u64,
    pub llm_retry_attempts: u32,
    pub question_count: usize,
    pub min_answer_chars: usize,
    pub improvement_window: usize,
    pub activity_utc_offset_minutes: i32,
    pub allow_global_session_fallback: bool,
    pub transcription_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            llm_model: std::env::var("LLM_MODEL")
                .unwrap_or_else(|_| crate::llm_client::DEFAULT_MODEL.to_string()),
            llm_analysis_timeout_secs: parse_env("LLM_ANALYSIS_TIMEOUT_SECS", 30)?,
            llm_bulk_timeout_secs: parse_env("LLM_BULK_TIMEOUT_SECS", 60)?,
            llm_retry_attempts: parse_env("LLM_RETRY_ATTEMPTS", 1)?,
            question_count: parse_env("QUESTION_COUNT", 15)?,
            min_answer_chars: parse_env("MIN_ANSWER_CHARS", 10)?,
            improvement_window: parse_env("IMPROVEMENT_WINDOW", 5)?,
            activity_utc_offset_minutes: parse_env("ACTIVITY_UTC_OFFSET_MINUTES", 0)?,
            allow_global_session_fallback: parse_env("ALLOW_GLOBAL_SESSION_FALLBACK", true)?,
            transcription_url: optional_env("TRANSCRIPTION_URL"),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            question_count: self.question_count,
            min_answer_chars: self.min_answer_chars,
            llm_retry_attempts: self.llm_retry_attempts,
            analysis_budget: CallBudget {
                max_tokens: 1500,
                timeout: Duration::from_secs(self.llm_analysis_timeout_secs),
            },
            bulk_budget: CallBudget {
                max_tokens: 4096,
                timeout: Duration::from_secs(self.llm_bulk_timeout_secs),
            },
            allow_global_session_fallback: self.allow_global_session_fallback,
        }
    }

    /// Offset that turns an instant into the user's activity date key.
    pub fn activity_offset(&self) -> Result<FixedOffset> {
        self.activity_utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| {
                format!(
                    "ACTIVITY_UTC_OFFSET_MINUTES out of range: {}",
                    self.activity_utc_offset_minutes
                )
            })
    }

    pub fn stats_policy(&self) -> StatsPolicy {
        StatsPolicy {
            improvement_window: self.improvement_window.max(2),
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
