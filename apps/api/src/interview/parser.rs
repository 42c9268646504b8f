//! Turns free model text into the structured shapes the engine uses.
//!
//! Extraction ladder, first success wins:
//! 1. the whole trimmed text as JSON
//! 2. the contents of a fenced code block (tagged or not)
//! 3. the first balanced `[...]` / `{...}` span that parses
//! 4. the canonical fallback for the call site
//!
//! Nothing here fails except `parse_questions` when the model returned a list
//! whose items are all blank. An empty question set makes a session meaningless,
//! so that case is surfaced instead of being papered over.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::interview::fallback::{fallback_analysis, fallback_insights, fallback_questions};
use crate::interview::models::{AnswerAnalysis, InterviewSession, SessionInsights, SessionMetrics};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("the model returned a question list with no usable questions")]
    NoUsableQuestions,
}

/// Where a parsed value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractedFrom {
    WholeText,
    FencedBlock,
    EmbeddedSpan,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct Parsed<T> {
    pub value: T,
    pub source: ExtractedFrom,
}

impl<T> Parsed<T> {
    pub fn used_fallback(&self) -> bool {
        self.source == ExtractedFrom::Fallback
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            source: ExtractedFrom::Fallback,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Array,
    Object,
}

impl Shape {
    fn open(self) -> char {
        match self {
            Shape::Array => '[',
            Shape::Object => '{',
        }
    }

    fn close(self) -> char {
        match self {
            Shape::Array => ']',
            Shape::Object => '}',
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Shape::Array => value.is_array(),
            Shape::Object => value.is_object(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Call-site entry points
// ────────────────────────────────────────────────────────────────────────────

/// Parses a question list. Falls back to the canonical 15 questions when no
/// JSON array can be found at all.
pub fn parse_questions(raw: &str) -> Result<Parsed<Vec<String>>, ParseError> {
    let Some((value, source)) = first_of_shape(raw, Shape::Array, Some) else {
        warn!("No JSON array found in question output, using fallback questions");
        return Ok(Parsed::fallback(fallback_questions()));
    };

    let questions = coerce_questions(value);
    if questions.is_empty() {
        warn!("Question array contained no usable questions");
        return Err(ParseError::NoUsableQuestions);
    }

    debug!("Parsed {} questions from {:?}", questions.len(), source);
    Ok(Parsed {
        value: questions,
        source,
    })
}

/// Parses an answer analysis. Never fails.
pub fn parse_analysis(raw: &str, answer: &str) -> Parsed<AnswerAnalysis> {
    match first_of_shape(raw, Shape::Object, |v| {
        deserialize_valid::<AnswerAnalysis>(v).filter(|a| !a.feedback.trim().is_empty())
    }) {
        Some((value, source)) => Parsed { value, source },
        None => {
            warn!("Answer analysis output unusable, using fallback analysis");
            Parsed::fallback(fallback_analysis(answer))
        }
    }
}

/// Parses session insights. Never fails; the fallback is derived from `metrics`.
pub fn parse_insights(
    raw: &str,
    session: &InterviewSession,
    metrics: &SessionMetrics,
) -> Parsed<SessionInsights> {
    match first_of_shape(raw, Shape::Object, |v| {
        deserialize_valid::<SessionInsights>(v)
            .filter(|i| !i.overall_assessment.trim().is_empty())
    }) {
        Some((value, source)) => Parsed { value, source },
        None => {
            warn!("Session insights output unusable, using locally computed insights");
            Parsed::fallback(fallback_insights(session, metrics))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Extraction ladder
// ────────────────────────────────────────────────────────────────────────────

fn deserialize_valid<T: DeserializeOwned>(value: Value) -> Option<T> {
    serde_json::from_value(value)
        .map_err(|e| debug!("Candidate JSON rejected: {e}"))
        .ok()
}

/// Walks the ladder and returns the first candidate of the right shape that
/// `accept` turns into a value.
fn first_of_shape<T>(
    raw: &str,
    shape: Shape,
    accept: impl Fn(Value) -> Option<T>,
) -> Option<(T, ExtractedFrom)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let try_candidate = |text: &str, source: ExtractedFrom| -> Option<(T, ExtractedFrom)> {
        let value: Value = serde_json::from_str(text.trim()).ok()?;
        if !shape.matches(&value) {
            return None;
        }
        accept(value).map(|v| (v, source))
    };

    if let Some(found) = try_candidate(trimmed, ExtractedFrom::WholeText) {
        return Some(found);
    }

    for block in fenced_blocks(trimmed) {
        if let Some(found) = try_candidate(block, ExtractedFrom::FencedBlock) {
            return Some(found);
        }
    }

    for span in balanced_spans(trimmed, shape) {
        if let Some(found) = try_candidate(span, ExtractedFrom::EmbeddedSpan) {
            return Some(found);
        }
    }

    None
}

/// Contents of every ``` fenced block. The opening fence's info string
/// (e.g. `json`) is skipped; an unterminated final block runs to the end.
fn fenced_blocks(text: &str) -> Vec<&str> {
    const FENCE: &str = "```";
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(FENCE) {
        let after_fence = &rest[start + FENCE.len()..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(after_fence.len());
        let body = &after_fence[body_start..];

        match body.find(FENCE) {
            Some(end) => {
                blocks.push(&body[..end]);
                rest = &body[end + FENCE.len()..];
            }
            None => {
                blocks.push(body);
                break;
            }
        }
    }

    blocks
}

/// Every balanced span opening with the shape's bracket, in order of position.
/// Brackets inside JSON string literals are ignored. Quotes only open a string
/// once a bracket is open, so prose quoting around the payload does not hide it.
/// One pass over the text; unclosed openers never produce a span.
fn balanced_spans(text: &str, shape: Shape) -> Vec<&str> {
    let (open, close) = (shape.open(), shape.close());
    let mut starts: Vec<usize> = Vec::new();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (pos, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' if !starts.is_empty() => in_string = true,
            c if c == open => starts.push(pos),
            c if c == close => {
                if let Some(start) = starts.pop() {
                    spans.push((start, pos + c.len_utf8()));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|&(start, _)| start);
    spans.into_iter().map(|(start, end)| &text[start..end]).collect()
}

/// Stringifies non-string items, unwraps `{"question": ...}` objects, trims,
/// and drops blanks.
fn coerce_questions(value: Value) -> Vec<String> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Object(ref map) => match map.get("question").and_then(Value::as_str) {
                Some(q) => Some(q.to_string()),
                None => Some(item.to_string()),
            },
            other => Some(other.to_string()),
        })
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .collect()
}
