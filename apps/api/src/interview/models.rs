//! Interview session data model and the structured shapes the model is asked to return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interview::lenient;

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            "abandoned" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }
}

/// Speech metrics captured alongside a spoken answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioMetrics {
    /// Seconds.
    pub duration: f64,
    pub words_per_minute: f64,
    pub word_count: u32,
}

/// One scored answer inside a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub question_index: usize,
    pub question: String,
    pub answer: String,
    pub audio_metrics: Option<AudioMetrics>,
    pub analysis: AnswerAnalysis,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate numbers computed once, at completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetrics {
    /// Minutes between creation and completion.
    pub total_duration: f64,
    /// Mean `overallScore` over scored responses; 0 when none are scored.
    pub average_score: f64,
    /// Percentage in [0, 100].
    pub completion_rate: f64,
    pub total_questions: usize,
    pub completed_questions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    pub session_id: String,
    pub user_id: Uuid,
    pub job_description: String,
    pub questions: Vec<String>,
    pub responses: Vec<SessionResponse>,
    pub status: SessionStatus,
    pub session_metrics: Option<SessionMetrics>,
    pub insights: Option<SessionInsights>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl InterviewSession {
    pub fn new(
        session_id: String,
        user_id: Uuid,
        job_description: String,
        questions: Vec<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            job_description,
            questions,
            responses: Vec::new(),
            status: SessionStatus::Active,
            session_metrics: None,
            insights: None,
            created_at,
            completed_at: None,
        }
    }

    /// Stores a response, replacing any earlier one for the same question index.
    /// Retried submissions therefore leave the session unchanged.
    pub fn upsert_response(&mut self, response: SessionResponse) {
        match self
            .responses
            .iter_mut()
            .find(|r| r.question_index == response.question_index)
        {
            Some(existing) => *existing = response,
            None => self.responses.push(response),
        }
    }

    /// Responses to questions of this session, ordered by question index rather
    /// than arrival. Responses whose index has no matching question are skipped.
    pub fn responses_by_question(&self) -> Vec<&SessionResponse> {
        let mut ordered: Vec<_> = self
            .responses
            .iter()
            .filter(|r| r.question_index < self.questions.len())
            .collect();
        ordered.sort_by_key(|r| r.question_index);
        ordered.dedup_by_key(|r| r.question_index);
        ordered
    }

    pub fn compute_metrics(&self, now: DateTime<Utc>) -> SessionMetrics {
        let answered = self.responses_by_question();
        let total_questions = self.questions.len();
        let completed_questions = answered.len();

        let completion_rate = if total_questions == 0 {
            0.0
        } else {
            (completed_questions as f64 / total_questions as f64 * 100.0).clamp(0.0, 100.0)
        };

        let scores: Vec<f64> = answered
            .iter()
            .map(|r| f64::from(r.analysis.overall_score))
            .filter(|s| *s > 0.0)
            .collect();
        let average_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        };

        let total_duration =
            ((now - self.created_at).num_milliseconds().max(0) as f64) / 1000.0 / 60.0;

        SessionMetrics {
            total_duration,
            average_score,
            completion_rate,
            total_questions,
            completed_questions,
        }
    }
}

/// Interview history totals for one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSessionSummary {
    pub total_sessions: u64,
    pub completed_sessions: u64,
    /// Mean of the stored session averages; sessions without metrics are skipped.
    pub average_score: f64,
    /// Questions asked across all sessions.
    pub total_questions: u64,
    pub total_responses: u64,
    /// Completed sessions as a percentage of all sessions.
    pub completion_rate: f64,
}

impl UserSessionSummary {
    pub fn from_counts(
        total_sessions: u64,
        completed_sessions: u64,
        average_score: Option<f64>,
        total_questions: u64,
        total_responses: u64,
    ) -> Self {
        let completion_rate = if total_sessions == 0 {
            0.0
        } else {
            completed_sessions as f64 / total_sessions as f64 * 100.0
        };
        Self {
            total_sessions,
            completed_sessions,
            average_score: average_score.unwrap_or(0.0),
            total_questions,
            total_responses,
            completion_rate,
        }
    }

    pub fn from_sessions<'a>(sessions: impl IntoIterator<Item = &'a InterviewSession>) -> Self {
        let (mut total, mut completed, mut questions, mut responses) = (0u64, 0u64, 0u64, 0u64);
        let mut averages = Vec::new();
        for session in sessions {
            total += 1;
            if session.status == SessionStatus::Completed {
                completed += 1;
            }
            if let Some(metrics) = &session.session_metrics {
                averages.push(metrics.average_score);
            }
            questions += session.questions.len() as u64;
            responses += session.responses.len() as u64;
        }

        let average = if averages.is_empty() {
            None
        } else {
            Some(averages.iter().sum::<f64>() / averages.len() as f64)
        };
        Self::from_counts(total, completed, average, questions, responses)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Answer analysis (per question)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarMethod {
    #[serde(default = "missing")]
    pub situation: String,
    #[serde(default = "missing")]
    pub task: String,
    #[serde(default = "missing")]
    pub action: String,
    #[serde(default = "missing")]
    pub result: String,
    #[serde(default, deserialize_with = "lenient::rating")]
    pub score: u8,
}

fn missing() -> String {
    "missing".to_string()
}

impl Default for StarMethod {
    fn default() -> Self {
        Self {
            situation: missing(),
            task: missing(),
            action: missing(),
            result: missing(),
            score: 0,
        }
    }
}

/// Structured feedback for one answer.
///
/// `overallScore` and `feedback` are required; everything else defaults so a
/// partially-filled model answer is still usable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAnalysis {
    #[serde(deserialize_with = "lenient::score")]
    pub overall_score: u8,
    #[serde(default = "neutral_score", deserialize_with = "lenient::score")]
    pub content_score: u8,
    #[serde(default = "neutral_score", deserialize_with = "lenient::score")]
    pub structure_score: u8,
    #[serde(default = "neutral_score", deserialize_with = "lenient::score")]
    pub communication_score: u8,
    #[serde(default = "neutral_score", deserialize_with = "lenient::score")]
    pub confidence_score: u8,
    pub feedback: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub star_method: StarMethod,
    #[serde(default, deserialize_with = "lenient::rating")]
    pub keyword_match: u8,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub specific_examples: bool,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub recommendations: Vec<String>,
}

fn neutral_score() -> u8 {
    5
}

// ────────────────────────────────────────────────────────────────────────────
// Session insights (whole session)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScores {
    #[serde(default, deserialize_with = "lenient::number")]
    pub content: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub structure: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub communication: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedFeedback {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub structure: String,
    #[serde(default)]
    pub communication: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionAnalytics {
    #[serde(deserialize_with = "lenient::count")]
    pub question_number: usize,
    #[serde(default, deserialize_with = "lenient::number")]
    pub score: f64,
    #[serde(default = "general_category")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub improvements: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_spent_seconds: Option<f64>,
}

fn general_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInsights {
    pub overall_assessment: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub total_score: f64,
    #[serde(default)]
    pub category_scores: CategoryScores,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub strengths: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub key_improvements: Vec<String>,
    #[serde(default)]
    pub detailed_feedback: DetailedFeedback,
    #[serde(default)]
    pub question_analytics: Vec<QuestionAnalytics>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub next_steps: String,
    /// Filled by the engine from locally computed numbers, never by the model.
    #[serde(default)]
    pub metrics: Option<SessionMetrics>,
}

/// Time the candidate spent on one question, as reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTiming {
    pub question_index: usize,
    pub time_spent_seconds: f64,
}
