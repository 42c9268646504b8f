// Interview practice sessions.
// Prompt building, lenient parsing of model output, session storage and the
// engine that drives a session from question generation to completion.
// All LLM calls go through llm_client.

pub mod engine;
pub mod fallback;
pub mod handlers;
pub mod lenient;
pub mod models;
pub mod parser;
pub mod pg_store;
pub mod prompts;
pub mod session_id;
pub mod store;
