//! Statistics as a fold over the activity log.
//!
//! `apply_activity` is the only place stats change. The ledger calls it once per
//! recorded activity; `fold` calls it over the whole stored log. Both paths
//! therefore agree for the same log.

use chrono::{Duration, NaiveDate};

use crate::activity::models::{
    Achievement, Activity, ActivityType, Contribution, UserStats, MAX_QUESTIONS_PER_ACTIVITY,
    MAX_RECENT_ACHIEVEMENTS, XP_PER_LEVEL,
};

const INTERVIEW_BASE_XP: u64 = 50;
const XP_PER_QUESTION: u64 = 5;
const VIDEO_UPLOAD_XP: u64 = 25;
const RESUME_UPLOAD_XP: u64 = 10;
const OTHER_ACTIVITY_XP: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsPolicy {
    /// Number of most recent scored interviews the improvement trend looks at.
    pub improvement_window: usize,
}

impl Default for StatsPolicy {
    fn default() -> Self {
        Self {
            improvement_window: 5,
        }
    }
}

/// Applies one activity, dated `date` in the user's local calendar, to `stats`.
pub fn apply_activity(
    stats: &mut UserStats,
    date: NaiveDate,
    activity: &Activity,
    policy: &StatsPolicy,
) {
    let xp = match &activity.activity_type {
        ActivityType::InterviewCompleted => apply_interview(stats, activity, policy),
        ActivityType::VideoUpload => {
            let seconds = activity.metadata.duration_seconds.unwrap_or(0.0).max(0.0);
            stats.total_questions = stats.total_questions.saturating_add(1);
            stats.total_video_time += seconds;
            stats.total_practice_time = stats
                .total_practice_time
                .saturating_add(seconds_to_minutes(seconds));
            VIDEO_UPLOAD_XP
        }
        ActivityType::ResumeUpload => RESUME_UPLOAD_XP,
        ActivityType::Other(_) => OTHER_ACTIVITY_XP,
    };

    stats.experience_points = stats.experience_points.saturating_add(xp);
    advance_levels(stats, activity);
    advance_streak(stats, date);
}

fn apply_interview(stats: &mut UserStats, activity: &Activity, policy: &StatsPolicy) -> u64 {
    let metadata = &activity.metadata;
    // Stored logs may predate request validation, so every input is bounded here too.
    let questions = metadata
        .questions_answered
        .unwrap_or(0)
        .min(MAX_QUESTIONS_PER_ACTIVITY);
    let score = metadata.average_score.unwrap_or(0.0).max(0.0).min(10.0);
    let completion = metadata.completion_rate.unwrap_or(0.0).max(0.0).min(100.0);
    let seconds = metadata.duration_seconds.unwrap_or(0.0).max(0.0);

    stats.total_interviews = stats.total_interviews.saturating_add(1);
    stats.total_questions = stats.total_questions.saturating_add(questions);
    stats.total_practice_time = stats
        .total_practice_time
        .saturating_add(seconds_to_minutes(seconds));

    if score > 0.0 {
        stats.scored_interviews = stats.scored_interviews.saturating_add(1);
        let n = f64::from(stats.scored_interviews);
        stats.average_score = (stats.average_score * (n - 1.0) + score) / n;

        stats.recent_scores.push(score);
        let window = policy.improvement_window.max(2);
        if stats.recent_scores.len() > window {
            let excess = stats.recent_scores.len() - window;
            stats.recent_scores.drain(..excess);
        }
        stats.improvement_rate = improvement_rate(&stats.recent_scores);
    }

    INTERVIEW_BASE_XP
        + XP_PER_QUESTION * u64::from(questions)
        + (completion * 2.0).floor() as u64
        + (score * 2.0).floor() as u64
}

/// Percent change from the oldest to the newest score in the window.
pub fn improvement_rate(scores: &[f64]) -> f64 {
    match (scores.first(), scores.last()) {
        (Some(&first), Some(&last)) if scores.len() >= 2 && first > 0.0 => {
            ((last - first) / first * 100.0).clamp(-100.0, 100.0)
        }
        _ => 0.0,
    }
}

fn advance_levels(stats: &mut UserStats, activity: &Activity) {
    while stats.experience_points >= u64::from(stats.level) * XP_PER_LEVEL {
        stats.level += 1;
        stats.recent_achievements.insert(
            0,
            Achievement {
                name: format!("Level {} Achieved!", stats.level),
                description: format!(
                    "Reached level {} through consistent practice",
                    stats.level
                ),
                level: stats.level,
                unlocked_at: activity.timestamp,
            },
        );
        stats.recent_achievements.truncate(MAX_RECENT_ACHIEVEMENTS);
    }
    stats.next_level_points = u64::from(stats.level) * XP_PER_LEVEL;
}

fn advance_streak(stats: &mut UserStats, date: NaiveDate) {
    let first_of_day = stats.last_active_date.map_or(true, |last| date > last);
    if !first_of_day {
        return;
    }

    let yesterday_active = stats.last_active_date == Some(date - Duration::days(1));
    if yesterday_active || stats.current_streak == 0 {
        stats.current_streak += 1;
    } else {
        stats.current_streak = 1;
    }
    stats.longest_streak = stats.longest_streak.max(stats.current_streak);
    stats.last_active_date = Some(date);
}

fn seconds_to_minutes(seconds: f64) -> u64 {
    (seconds / 60.0).round() as u64
}

/// Rebuilds statistics from a user's full log.
pub fn fold(contributions: &[Contribution], policy: &StatsPolicy) -> UserStats {
    let mut days: Vec<&Contribution> = contributions.iter().collect();
    days.sort_by_key(|c| c.date);

    let mut stats = UserStats::default();
    for day in days {
        for activity in &day.activities {
            apply_activity(&mut stats, day.date, activity, policy);
        }
    }
    stats
}

/// The stored streak if it is still alive on `today`, otherwise 0.
pub fn live_streak(stats: &UserStats, today: NaiveDate) -> u32 {
    match stats.last_active_date {
        Some(last) if last >= today - Duration::days(1) => stats.current_streak,
        _ => 0,
    }
}

/// Completed interviews in the seven local days ending on `today`.
pub fn weekly_interviews(contributions: &[Contribution], today: NaiveDate) -> u32 {
    let week_start = today - Duration::days(6);
    contributions
        .iter()
        .filter(|c| c.date >= week_start && c.date <= today)
        .flat_map(|c| &c.activities)
        .filter(|a| a.activity_type == ActivityType::InterviewCompleted)
        .count() as u32
}
