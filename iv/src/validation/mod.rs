//! Validation of LLM output
//!
//! Parsing raw model text into JSON, then checking it against the phase or
//! step it was produced for. Nothing here performs I/O.

mod output;
mod parse;

pub use output::{
    ConversationOutcome, ConversationRules, FINAL_ATTEMPT, FieldRule, GenerationOutcome, Violation, field_rules,
    validate_conversation_output, validate_generation_output,
};
pub use parse::{extract_json_object, parse_conversation, parse_generation, strip_code_fences};
