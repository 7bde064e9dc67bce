//! Interview - scripted multi-step interview engine
//!
//! Turns free-text answers into structured profile fields: qualification IDs,
//! must-have tag IDs and bounded-length summary texts. Open-ended wording is
//! delegated to an LLM; everything with an invariant stays deterministic.
//!
//! # Steps
//!
//! 1. qualification - resolved against reference data, with a choice prompt
//!    when ambiguous
//! 2. can, 3. will, 4. must-have, 5. self, 6. synthesis - each runs
//!    `intro -> empathy -> deepening* -> generation`
//!
//! # Modules
//!
//! - [`steps`] - step handlers, phase router and the [`Interview`] dispatcher
//! - [`validation`] - parsing and checking of LLM output
//! - [`state`] - session store trait and its in-memory actor
//! - [`prompts`] - per-step Handlebars templates
//! - [`llm`] - LLM client trait with OpenAI and Anthropic implementations
//! - [`domain`] - status and position types
//! - [`config`] - configuration types and loading
//! - [`cli`] / [`repl`] - command-line interface

pub mod cli;
pub mod config;
pub mod domain;
pub mod llm;
pub mod prompts;
pub mod repl;
pub mod state;
pub mod steps;
pub mod validation;

// Re-export commonly used types
pub use config::{Config, LlmConfig, MustHaveMode};
pub use domain::{Meta, Phase, Status, TextField};
pub use llm::{CompletionRequest, CompletionResponse, LlmClient, LlmError};
pub use prompts::{PromptContext, PromptError, PromptLoader};
pub use state::{SessionManager, SessionStore, StateError};
pub use steps::{Drill, Interview, InterviewError, RouterSettings, StepHandler, TurnRequest, TurnResponse};
pub use validation::{ConversationOutcome, GenerationOutcome};
