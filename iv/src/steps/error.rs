//! Interview errors

use thiserror::Error;

use crate::prompts::PromptError;
use crate::state::StateError;

/// Errors surfaced to the caller of a turn
///
/// Invalid or failed LLM output is never one of these; it degrades instead.
#[derive(Debug, Error)]
pub enum InterviewError {
    #[error("Unsupported step: {0}")]
    UnsupportedStep(u8),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Session store error: {0}")]
    Session(#[from] StateError),
}
