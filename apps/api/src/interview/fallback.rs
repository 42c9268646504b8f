//! Canonical payloads used when the model's output cannot be used.
//!
//! Every constructor here is total: it never fails and always produces a value
//! of the shape the call site expects.

use crate::interview::models::{
    AnswerAnalysis, CategoryScores, DetailedFeedback, InterviewSession, QuestionAnalytics,
    SessionInsights, SessionMetrics, StarMethod,
};

pub const FALLBACK_QUESTIONS: [&str; 15] = [
    "Tell me about yourself.",
    "What are your strengths and weaknesses?",
    "Why are you interested in this role?",
    "Describe a challenging situation you've faced at work and how you handled it.",
    "Where do you see yourself in 5 years?",
    "What specific skills do you bring to this position?",
    "How do you handle tight deadlines?",
    "Describe a time when you had to work with a difficult team member.",
    "What motivates you in your work?",
    "How do you stay updated with industry trends?",
    "Describe a project you're particularly proud of.",
    "How do you handle feedback and criticism?",
    "What would you do in your first 90 days in this role?",
    "Describe a time when you had to learn something new quickly.",
    "How do you prioritize your work when you have multiple deadlines?",
];

pub const FALLBACK_OVERALL_SCORE: u8 = 6;

pub fn fallback_questions() -> Vec<String> {
    FALLBACK_QUESTIONS.iter().map(|q| q.to_string()).collect()
}

/// Neutral analysis. `specificExamples` is the only answer-dependent field.
pub fn fallback_analysis(answer: &str) -> AnswerAnalysis {
    let answer_lower = answer.to_lowercase();
    AnswerAnalysis {
        overall_score: FALLBACK_OVERALL_SCORE,
        content_score: 6,
        structure_score: 6,
        communication_score: 6,
        confidence_score: 6,
        feedback: "Your answer provides some relevant information. Consider providing more \
            specific examples and structuring your response using the STAR method \
            (Situation, Task, Action, Result) for better clarity."
            .to_string(),
        strengths: vec![
            "Shows relevant experience".to_string(),
            "Demonstrates understanding".to_string(),
        ],
        improvements: vec![
            "Add specific examples".to_string(),
            "Improve structure".to_string(),
            "Provide quantifiable results".to_string(),
        ],
        star_method: StarMethod {
            situation: "partial".to_string(),
            task: "partial".to_string(),
            action: "present".to_string(),
            result: "missing".to_string(),
            score: 5,
        },
        keyword_match: 6,
        specific_examples: answer_lower.contains("example") || answer_lower.contains("instance"),
        recommendations: vec![
            "Use the STAR method to structure your response".to_string(),
            "Include specific, quantifiable examples".to_string(),
            "Connect your experience directly to the job requirements".to_string(),
        ],
    }
}

/// Insights built only from numbers already computed for the session.
pub fn fallback_insights(session: &InterviewSession, metrics: &SessionMetrics) -> SessionInsights {
    let average = metrics.average_score;

    let question_analytics = session
        .responses_by_question()
        .into_iter()
        .map(|r| QuestionAnalytics {
            question_number: r.question_index + 1,
            score: f64::from(r.analysis.overall_score),
            category: question_category(&r.question).to_string(),
            strengths: r.analysis.strengths.clone(),
            improvements: r.analysis.improvements.clone(),
            time_spent_seconds: None,
        })
        .collect();

    SessionInsights {
        overall_assessment: format!(
            "You answered {} of {} questions with an average score of {:.1}/10. \
            Your session showed good potential with room for improvement in structure \
            and specific examples.",
            metrics.completed_questions, metrics.total_questions, average
        ),
        total_score: (average * 10.0).round(),
        category_scores: CategoryScores {
            content: average.round(),
            structure: (average - 1.0).max(0.0).round(),
            communication: average.round(),
            confidence: average.round(),
        },
        strengths: vec![
            "Shows relevant experience".to_string(),
            "Demonstrates understanding".to_string(),
            "Good communication skills".to_string(),
        ],
        key_improvements: vec![
            "Use STAR method".to_string(),
            "Provide specific examples".to_string(),
            "Improve response structure".to_string(),
        ],
        detailed_feedback: DetailedFeedback {
            content: "Your responses show good understanding of the role requirements.".to_string(),
            structure: "Consider using the STAR method for better organization.".to_string(),
            communication: "Your communication is clear but could be more concise.".to_string(),
        },
        question_analytics,
        recommendations: vec![
            "Practice the STAR method for behavioral questions".to_string(),
            "Prepare specific examples with quantifiable results".to_string(),
            "Work on response timing and conciseness".to_string(),
        ],
        next_steps: "Focus on practicing with the STAR method and preparing specific examples \
            for common interview questions."
            .to_string(),
        metrics: Some(metrics.clone()),
    }
}

fn question_category(question: &str) -> &'static str {
    const BEHAVIORAL_MARKERS: &[&str] = &[
        "tell me about a time",
        "describe a time",
        "describe a situation",
        "give an example",
        "how do you handle",
    ];
    let q = question.to_lowercase();
    if BEHAVIORAL_MARKERS.iter().any(|m| q.contains(m)) {
        "behavioral"
    } else {
        "general"
    }
}
