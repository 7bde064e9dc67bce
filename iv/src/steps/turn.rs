//! Turn envelopes

use serde::{Deserialize, Serialize};

use crate::domain::{Meta, Status, TextField};

/// Degraded-field name used when a conversation reply could not be produced
pub const DEGRADED_RESPONSE: &str = "response";

/// One interview turn from the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    pub session_id: String,
    #[serde(default)]
    pub status: Status,
    /// Only `step` is used; the phase is tracked server side
    pub meta: Meta,
    #[serde(default)]
    pub user_message: String,
}

impl TurnRequest {
    pub fn new(session_id: impl Into<String>, status: Status, meta: Meta, user_message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            status,
            meta,
            user_message: user_message.into(),
        }
    }
}

/// Step-1 choice prompt state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drill {
    pub awaiting_choice: bool,
    pub options: Vec<String>,
    /// The previous reply matched none of the options
    pub retry: bool,
}

/// Result of one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnResponse {
    pub status: Status,
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drill: Option<Drill>,
    /// Fields left empty because the model never produced valid output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}

impl TurnResponse {
    pub fn new(status: Status, meta: Meta) -> Self {
        Self {
            status,
            meta,
            response: None,
            drill: None,
            degraded: Vec::new(),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn with_drill(mut self, drill: Drill) -> Self {
        self.drill = Some(drill);
        self
    }

    pub fn with_degraded(mut self, fields: impl IntoIterator<Item = String>) -> Self {
        self.degraded.extend(fields);
        self
    }

    /// True when any field was blanked by forced success
    pub fn is_degraded(&self) -> bool {
        !self.degraded.is_empty()
    }

    /// True when the given generated field was blanked
    pub fn degraded_field(&self, field: TextField) -> bool {
        self.degraded.iter().any(|f| f == field.key())
    }
}
