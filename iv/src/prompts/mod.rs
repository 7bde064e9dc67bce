//! Prompt management
//!
//! One Handlebars template per LLM-backed step, discovered in the prompt
//! directory at startup.

mod loader;

pub use loader::{PromptContext, PromptError, PromptLoader};
