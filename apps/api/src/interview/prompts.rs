//! Prompt templates and builders for the interview pipeline.
//!
//! Builders are pure: the same inputs always produce the same prompt text.

use crate::interview::models::{AudioMetrics, InterviewSession, SessionMetrics};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;

const NO_RESUME: &str =
    "(No resume on file. Base the questions on the job description alone.)";

/// Question generation template.
/// Replace: {count}, {resume_text}, {job_description}, {json_only}
pub const QUESTION_PROMPT_TEMPLATE: &str = r#"Based on the following resume and job description, generate exactly {count} insightful interview questions that assess the candidate's suitability for the role.

USER'S RESUME:
{resume_text}

JOB DESCRIPTION:
{job_description}

INSTRUCTIONS:
- Mix technical questions with general and behavioral (STAR method) questions; at least 3 must be behavioral
- Tie every question to the job requirements
- Let the candidate showcase relevant experience
- Keep each question specific and answerable in a few minutes

Return a JSON array of exactly {count} strings:
["Question one?", "Question two?"]

{json_only}"#;

/// Answer analysis template.
/// Replace: {question}, {answer}, {audio_section}, {json_only}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the following answer to an interview question and give detailed, constructive feedback across multiple dimensions.

INTERVIEW QUESTION:
{question}

CANDIDATE'S ANSWER:
{answer}
{audio_section}
Return a JSON object with this EXACT schema:
{
  "overallScore": 7,
  "contentScore": 8,
  "structureScore": 6,
  "communicationScore": 7,
  "confidenceScore": 7,
  "feedback": "Detailed feedback paragraph",
  "strengths": ["strength1", "strength2"],
  "improvements": ["improvement1", "improvement2"],
  "starMethod": {
    "situation": "present",
    "task": "present",
    "action": "present",
    "result": "missing",
    "score": 6
  },
  "keywordMatch": 8,
  "specificExamples": true,
  "recommendations": ["rec1", "rec2", "rec3"]
}

SCORING GUIDE (integers 1-10):
- contentScore: relevance, depth, accuracy
- structureScore: organization, flow, STAR usage
- communicationScore: clarity, pace, articulation
- confidenceScore: assertiveness, conviction
- overallScore: holistic assessment
starMethod fields are "present", "partial" or "missing".

{json_only}"#;

/// Session insights template.
/// Replace: {total_questions}, {completed_questions}, {completion_rate},
///          {average_score}, {total_duration}, {responses}, {json_only}
pub const INSIGHTS_PROMPT_TEMPLATE: &str = r#"Analyze this complete mock interview session and give comprehensive insights and recommendations.

SESSION OVERVIEW:
- Total Questions: {total_questions}
- Completed Questions: {completed_questions}
- Completion Rate: {completion_rate}%
- Average Score: {average_score}/10
- Total Duration: {total_duration} minutes

INDIVIDUAL RESPONSES:
{responses}

Return a JSON object with this EXACT schema:
{
  "overallAssessment": "Comprehensive paragraph assessment",
  "totalScore": 75,
  "categoryScores": {"content": 8, "structure": 6, "communication": 7, "confidence": 7},
  "strengths": ["strength1", "strength2", "strength3"],
  "keyImprovements": ["improvement1", "improvement2", "improvement3"],
  "detailedFeedback": {
    "content": "Detailed content feedback",
    "structure": "Detailed structure feedback",
    "communication": "Detailed communication feedback"
  },
  "questionAnalytics": [
    {"questionNumber": 1, "score": 8, "category": "behavioral", "strengths": ["strength1"], "improvements": ["improvement1"]}
  ],
  "recommendations": ["actionable recommendation 1", "actionable recommendation 2"],
  "nextSteps": "Paragraph with specific next steps"
}

totalScore is on a 0-100 scale; categoryScores are on a 1-10 scale.
questionAnalytics has one entry per answered question, numbered as listed above.

{json_only}"#;

pub fn build_question_prompt(job_description: &str, resume_text: &str, count: usize) -> String {
    let resume_text = if resume_text.trim().is_empty() {
        NO_RESUME
    } else {
        resume_text.trim()
    };

    QUESTION_PROMPT_TEMPLATE
        .replace("{count}", &count.to_string())
        .replace("{resume_text}", resume_text)
        .replace("{job_description}", job_description.trim())
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
}

pub fn build_answer_analysis_prompt(
    question: &str,
    answer: &str,
    audio_metrics: Option<&AudioMetrics>,
) -> String {
    let audio_section = match audio_metrics {
        Some(m) => format!(
            "\nAUDIO METRICS:\n- Duration: {:.0} seconds\n- Words per minute: {:.0}\n- Word count: {}\n",
            m.duration, m.words_per_minute, m.word_count
        ),
        None => String::new(),
    };

    ANALYSIS_PROMPT_TEMPLATE
        .replace("{question}", question.trim())
        .replace("{answer}", answer.trim())
        .replace("{audio_section}", &audio_section)
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
}

pub fn build_insights_prompt(session: &InterviewSession, metrics: &SessionMetrics) -> String {
    let responses = session
        .responses_by_question()
        .iter()
        .map(|r| {
            format!(
                "Question {}: {}\nAnswer: {}\nScores: Overall={}, Content={}, Structure={}, Communication={}, Confidence={}",
                r.question_index + 1,
                r.question,
                r.answer,
                r.analysis.overall_score,
                r.analysis.content_score,
                r.analysis.structure_score,
                r.analysis.communication_score,
                r.analysis.confidence_score,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let responses = if responses.is_empty() {
        "(No questions were answered.)".to_string()
    } else {
        responses
    };

    INSIGHTS_PROMPT_TEMPLATE
        .replace("{total_questions}", &metrics.total_questions.to_string())
        .replace("{completed_questions}", &metrics.completed_questions.to_string())
        .replace("{completion_rate}", &format!("{:.1}", metrics.completion_rate))
        .replace("{average_score}", &format!("{:.1}", metrics.average_score))
        .replace("{total_duration}", &format!("{:.1}", metrics.total_duration))
        .replace("{responses}", &responses)
        .replace("{json_only}", JSON_ONLY_INSTRUCTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_question_prompt_fills_every_placeholder() {
        let prompt = build_question_prompt("Senior backend engineer, Go", "10 years of Go", 15);
        assert!(prompt.contains("exactly 15"));
        assert!(prompt.contains("Senior backend engineer, Go"));
        assert!(prompt.contains("10 years of Go"));
        assert!(prompt.contains("Return ONLY JSON"));
        assert!(!prompt.contains("{count}"));
        assert!(!prompt.contains("{resume_text}"));
        assert!(!prompt.contains("{job_description}"));
    }

    #[test]
    fn test_question_prompt_without_resume() {
        let prompt = build_question_prompt("Data engineer", "   ", 15);
        assert!(prompt.contains(NO_RESUME));
    }

    #[test]
    fn test_question_prompt_is_deterministic() {
        let a = build_question_prompt("JD", "resume", 15);
        let b = build_question_prompt("JD", "resume", 15);
        assert_eq!(a, b);
    }

    #[test]
    fn test_analysis_prompt_lists_required_keys() {
        let prompt = build_answer_analysis_prompt("Why Rust?", "Because of safety.", None);
        for key in [
            "overallScore",
            "contentScore",
            "structureScore",
            "communicationScore",
            "confidenceScore",
            "feedback",
            "strengths",
            "improvements",
            "starMethod",
            "keywordMatch",
            "specificExamples",
            "recommendations",
        ] {
            assert!(prompt.contains(key), "missing {key}");
        }
        assert!(!prompt.contains("AUDIO METRICS"));
        assert!(prompt.contains("Return ONLY JSON"));
    }

    #[test]
    fn test_analysis_prompt_includes_audio_metrics() {
        let metrics = AudioMetrics {
            duration: 62.0,
            words_per_minute: 140.0,
            word_count: 145,
        };
        let prompt = build_answer_analysis_prompt("Q", "A long answer", Some(&metrics));
        assert!(prompt.contains("Duration: 62 seconds"));
        assert!(prompt.contains("Words per minute: 140"));
        assert!(prompt.contains("Word count: 145"));
    }

    #[test]
    fn test_insights_prompt_summarises_session() {
        let session = InterviewSession::new(
            "s".into(),
            Uuid::new_v4(),
            "JD".into(),
            vec!["Q1".into(), "Q2".into()],
            Utc::now(),
        );
        let metrics = session.compute_metrics(session.created_at);
        let prompt = build_insights_prompt(&session, &metrics);
        assert!(prompt.contains("Total Questions: 2"));
        assert!(prompt.contains("(No questions were answered.)"));
        assert!(prompt.contains("questionAnalytics"));
        assert!(prompt.contains("Return ONLY JSON"));
    }
}
