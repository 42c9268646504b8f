// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains the cross-cutting pieces.

/// System prompt used by every interview-coaching call.
pub const COACH_SYSTEM: &str = "You are an expert interview coach. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT include explanations or apologies.";

/// Closing instruction appended to every prompt to keep the parser's job small.
pub const JSON_ONLY_INSTRUCTION: &str =
    "Return ONLY JSON, no additional text before or after it.";
