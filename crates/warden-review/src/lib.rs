//! LLM-backed analysis of pull request changes.
//!
//! One request per review: the changed files are rendered into a single
//! prompt, the model answers with review commentary, bug findings, and
//! regression test suggestions, and the response is decoded tolerantly so
//! a malformed answer degrades to a plain-text summary instead of failing
//! the run.

mod client;
mod parse;
mod prompt;

pub use client::{api_key_env_var, ChatModel, LlmClient};
pub use parse::parse_review_response;
pub use prompt::{build_analysis_prompt, render_diff, render_diffs, ANALYSIS_INSTRUCTION};
