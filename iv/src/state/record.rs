//! Per-session records held by the session store

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Phase;

/// Most options a step-1 choice prompt carries
pub const MAX_CHOICE_OPTIONS: usize = 6;

/// One user message and the reply shown for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

impl Exchange {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Phase progress of a session within one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseState {
    pub step: u8,
    pub phase: Phase,
    /// Completed deepening turns
    pub cycles: u8,
    /// Exchanges of this step, oldest first
    #[serde(default)]
    pub history: Vec<Exchange>,
}

impl PhaseState {
    /// State at the start of a step
    pub fn fresh(step: u8) -> Self {
        debug!(%step, "PhaseState::fresh: called");
        Self {
            step,
            phase: Phase::Intro,
            cycles: 0,
            history: Vec::new(),
        }
    }

    /// Stored state if it belongs to `step`, otherwise a fresh one
    pub fn resume(stored: Option<Self>, step: u8) -> Self {
        match stored {
            Some(state) if state.step == step => state,
            Some(state) => {
                debug!(stored_step = %state.step, %step, "PhaseState::resume: step changed, resetting");
                Self::fresh(step)
            }
            None => Self::fresh(step),
        }
    }

    /// Everything the user said in this step, oldest first
    pub fn user_text(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(|e| e.user.as_str())
    }
}

/// Candidate labels awaiting a step-1 choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoices {
    pub options: Vec<String>,
}

impl PendingChoices {
    /// Keep at most [`MAX_CHOICE_OPTIONS`] options, in order
    pub fn new(mut options: Vec<String>) -> Self {
        options.truncate(MAX_CHOICE_OPTIONS);
        Self { options }
    }
}
