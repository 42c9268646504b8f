//! Activity ledger data: per-day contribution records and the statistics derived from them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ────────────────────────────────────────────────────────────────────────────
// Activities
// ────────────────────────────────────────────────────────────────────────────

/// Known activity kinds. Anything else is kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    InterviewCompleted,
    VideoUpload,
    ResumeUpload,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::InterviewCompleted => "interview_completed",
            ActivityType::VideoUpload => "video_upload",
            ActivityType::ResumeUpload => "resume_upload",
            ActivityType::Other(name) => name,
        }
    }

    pub fn default_description(&self) -> String {
        format!("{} activity", self.as_str())
    }
}

impl From<String> for ActivityType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "interview_completed" => ActivityType::InterviewCompleted,
            "video_upload" => ActivityType::VideoUpload,
            "resume_upload" => ActivityType::ResumeUpload,
            _ => ActivityType::Other(raw),
        }
    }
}

impl From<ActivityType> for String {
    fn from(kind: ActivityType) -> Self {
        kind.as_str().to_string()
    }
}

/// Inputs the per-type stat rules read. Unknown keys are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_answered: Option<u32>,
    /// Session average on the 1-10 scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Percentage in [0, 100].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_rate: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Most questions a single activity can credit.
pub const MAX_QUESTIONS_PER_ACTIVITY: u32 = 100;
/// Longest duration a single activity can credit: one day.
pub const MAX_ACTIVITY_SECONDS: f64 = 86_400.0;

impl ActivityMetadata {
    /// Checks caller-supplied numbers before they reach the stats reducer.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(questions) = self.questions_answered {
            if questions > MAX_QUESTIONS_PER_ACTIVITY {
                return Err(format!(
                    "questionsAnswered must be at most {MAX_QUESTIONS_PER_ACTIVITY}"
                ));
            }
        }
        check_range("averageScore", self.average_score, 0.0, 10.0)?;
        check_range("completionRate", self.completion_rate, 0.0, 100.0)?;
        check_range("durationSeconds", self.duration_seconds, 0.0, MAX_ACTIVITY_SECONDS)
    }
}

fn check_range(field: &str, value: Option<f64>, min: f64, max: f64) -> Result<(), String> {
    match value {
        Some(v) if !v.is_finite() || v < min || v > max => {
            Err(format!("{field} must be a number between {min} and {max}"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: ActivityMetadata,
}

/// One user's activity on one local calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub date: NaiveDate,
    pub count: u32,
    pub activities: Vec<Activity>,
}

impl Contribution {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            count: 0,
            activities: Vec::new(),
        }
    }

    /// Appends and keeps `count == activities.len()`.
    pub fn push(&mut self, activity: Activity) {
        self.activities.push(activity);
        self.count = self.activities.len() as u32;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Derived statistics
// ────────────────────────────────────────────────────────────────────────────

pub const XP_PER_LEVEL: u64 = 1000;
pub const MAX_RECENT_ACHIEVEMENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub name: String,
    pub description: String,
    pub level: u32,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub experience_points: u64,
    pub level: u32,
    pub next_level_points: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_active_date: Option<NaiveDate>,
    pub total_interviews: u32,
    pub scored_interviews: u32,
    pub total_questions: u32,
    /// Minutes.
    pub total_practice_time: u64,
    /// Seconds.
    pub total_video_time: f64,
    pub average_score: f64,
    /// Percent, clamped to [-100, 100].
    pub improvement_rate: f64,
    /// Scores of the most recent scored interviews, oldest first.
    pub recent_scores: Vec<f64>,
    pub recent_achievements: Vec<Achievement>,
}

impl Default for UserStats {
    fn default() -> Self {
        Self {
            experience_points: 0,
            level: 1,
            next_level_points: XP_PER_LEVEL,
            current_streak: 0,
            longest_streak: 0,
            last_active_date: None,
            total_interviews: 0,
            scored_interviews: 0,
            total_questions: 0,
            total_practice_time: 0,
            total_video_time: 0.0,
            average_score: 0.0,
            improvement_rate: 0.0,
            recent_scores: Vec::new(),
            recent_achievements: Vec::new(),
        }
    }
}
