//! Output validation
//!
//! Pure checks of parsed LLM output. Conversation phases need a usable
//! `response`; generation needs every field of the step within its length
//! range. Lengths are counted in characters.

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ConversationConfig;
use crate::domain::{Phase, Status, TextField};

/// Attempt on which generation is forced to succeed
pub const FINAL_ATTEMPT: u32 = 2;

/// Phase-specific bans for conversation replies
#[derive(Debug, Clone)]
pub struct ConversationRules {
    /// Acknowledgement phrases a deepening reply must not contain
    pub filler_phrases: Vec<String>,
}

impl ConversationRules {
    pub fn from_config(config: &ConversationConfig) -> Self {
        Self {
            filler_phrases: config.filler_phrases.clone(),
        }
    }
}

impl Default for ConversationRules {
    fn default() -> Self {
        Self::from_config(&ConversationConfig::default())
    }
}

/// Why a conversation reply was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Empathy turns must not ask anything
    QuestionInEmpathy,
    /// Deepening reply stalled on an acknowledgement phrase
    FillerInDeepening(String),
    /// Output was not shaped like `{"response": "..."}`
    SchemaMismatch(String),
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QuestionInEmpathy => write!(f, "question in empathy reply"),
            Self::FillerInDeepening(phrase) => write!(f, "filler phrase in deepening reply: {}", phrase),
            Self::SchemaMismatch(reason) => write!(f, "schema mismatch: {}", reason),
        }
    }
}

/// Result of checking a conversation reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationOutcome {
    Accepted { response: String },
    /// Nothing usable came back
    Empty,
    Rejected(Violation),
}

impl ConversationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Check a conversation-phase reply
pub fn validate_conversation_output(
    phase: Phase,
    parsed: Option<&Value>,
    rules: &ConversationRules,
) -> ConversationOutcome {
    debug!(%phase, "validate_conversation_output: called");
    let Some(parsed) = parsed else {
        return ConversationOutcome::Empty;
    };
    let Some(object) = parsed.as_object() else {
        return ConversationOutcome::Rejected(Violation::SchemaMismatch("expected a JSON object".to_string()));
    };
    let response = match object.get("response") {
        Some(Value::String(response)) => response.trim(),
        Some(_) => {
            return ConversationOutcome::Rejected(Violation::SchemaMismatch("response is not a string".to_string()));
        }
        None => {
            return ConversationOutcome::Rejected(Violation::SchemaMismatch("missing response".to_string()));
        }
    };
    if response.is_empty() {
        return ConversationOutcome::Empty;
    }

    match phase {
        Phase::Empathy if response.contains(['?', '？']) => {
            debug!("validate_conversation_output: question in empathy");
            return ConversationOutcome::Rejected(Violation::QuestionInEmpathy);
        }
        Phase::Deepening => {
            if let Some(phrase) = rules
                .filler_phrases
                .iter()
                .find(|phrase| !phrase.is_empty() && response.contains(phrase.as_str()))
            {
                debug!(%phrase, "validate_conversation_output: filler in deepening");
                return ConversationOutcome::Rejected(Violation::FillerInDeepening(phrase.clone()));
            }
        }
        _ => {}
    }

    ConversationOutcome::Accepted {
        response: response.to_string(),
    }
}

/// Length constraints for one generated field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub field: TextField,
    pub min: usize,
    pub max: usize,
    /// Newlines kept; later ones become spaces
    pub max_newlines: Option<usize>,
}

const fn rule(field: TextField, min: usize, max: usize, max_newlines: Option<usize>) -> FieldRule {
    FieldRule {
        field,
        min,
        max,
        max_newlines,
    }
}

const STEP2_RULES: &[FieldRule] = &[rule(TextField::Can, 60, 90, None)];
const STEP3_RULES: &[FieldRule] = &[rule(TextField::Will, 60, 90, None)];
const STEP4_RULES: &[FieldRule] = &[rule(TextField::MustHave, 60, 90, None)];
const STEP5_RULES: &[FieldRule] = &[rule(TextField::SelfText, 100, 280, None)];
const STEP6_RULES: &[FieldRule] = &[
    rule(TextField::Doing, 280, 320, Some(2)),
    rule(TextField::Being, 280, 320, Some(2)),
];

/// Fields produced by a step's generation phase
pub fn field_rules(step: u8) -> &'static [FieldRule] {
    match step {
        2 => STEP2_RULES,
        3 => STEP3_RULES,
        4 => STEP4_RULES,
        5 => STEP5_RULES,
        6 => STEP6_RULES,
        _ => &[],
    }
}

/// Result of checking a generation reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Every field within range (after clamping)
    Accepted { status: Status },
    /// Final attempt: invalid fields replaced by empty strings
    Degraded { status: Status, blanked: Vec<TextField> },
    SchemaMismatch(String),
    TooShort { field: TextField, len: usize, min: usize },
}

impl GenerationOutcome {
    /// Status patch of a terminal outcome
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::Accepted { status } | Self::Degraded { status, .. } => Some(status),
            Self::SchemaMismatch(_) | Self::TooShort { .. } => None,
        }
    }
}

/// Check a generation reply for `step`
///
/// Fields are trimmed, surplus newlines turned into spaces and the result
/// truncated to the maximum before the minimum is checked. From
/// [`FINAL_ATTEMPT`] on the outcome is always terminal.
pub fn validate_generation_output(step: u8, parsed: Option<&Value>, attempt: u32) -> GenerationOutcome {
    debug!(%step, %attempt, "validate_generation_output: called");
    let rules = field_rules(step);
    if rules.is_empty() {
        return GenerationOutcome::SchemaMismatch(format!("step {} has no generation fields", step));
    }

    let object = parsed.and_then(Value::as_object);
    let mut status = Status::default();
    let mut blanked = Vec::new();
    let mut first_problem = None;

    for rule in rules {
        let key = rule.field.key();
        let problem = match object.and_then(|o| o.get(key)) {
            Some(Value::String(raw)) => {
                let text = clamp(&limit_newlines(raw.trim(), rule.max_newlines), rule.max);
                let len = text.chars().count();
                status.set_text(rule.field, text);
                (len < rule.min).then_some(GenerationOutcome::TooShort {
                    field: rule.field,
                    len,
                    min: rule.min,
                })
            }
            Some(_) => Some(GenerationOutcome::SchemaMismatch(format!("{} is not a string", key))),
            None if object.is_none() => Some(GenerationOutcome::SchemaMismatch("expected a JSON object".to_string())),
            None => Some(GenerationOutcome::SchemaMismatch(format!("missing {}", key))),
        };

        if let Some(problem) = problem {
            debug!(%key, ?problem, "validate_generation_output: invalid field");
            blanked.push(rule.field);
            first_problem.get_or_insert(problem);
        }
    }

    match first_problem {
        None => GenerationOutcome::Accepted { status },
        Some(_) if attempt >= FINAL_ATTEMPT => {
            for field in &blanked {
                status.set_text(*field, String::new());
            }
            warn!(%step, ?blanked, "Generation degraded to empty fields");
            GenerationOutcome::Degraded { status, blanked }
        }
        Some(problem) => problem,
    }
}

/// Replace every newline after the first `max` with a space
fn limit_newlines(text: &str, max: Option<usize>) -> String {
    let text = text.replace("\r\n", "\n");
    let Some(max) = max else {
        return text;
    };
    let mut seen = 0;
    text.chars()
        .map(|c| {
            if c != '\n' {
                return c;
            }
            seen += 1;
            if seen > max { ' ' } else { c }
        })
        .collect()
}

/// Truncate to at most `max` characters
fn clamp(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
