//! Interview position

use serde::{Deserialize, Serialize};
use tracing::debug;

/// First step (qualification)
pub const FIRST_STEP: u8 = 1;

/// Last step that collects data (synthesis)
pub const LAST_STEP: u8 = 6;

/// Step number reported once the interview is complete
pub const COMPLETED_STEP: u8 = 7;

/// Sub-state within the LLM-backed part of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Opening question for the step
    Intro,
    /// Acknowledge the answer without asking anything
    Empathy,
    /// Ask for more concrete detail
    Deepening,
    /// Produce the structured fields for the step
    Generation,
}

impl Phase {
    /// Lower-case name, as used on the wire and in prompt templates
    pub fn name(&self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Empathy => "empathy",
            Self::Deepening => "deepening",
            Self::Generation => "generation",
        }
    }

    /// Parse a wire name
    pub fn from_name(name: &str) -> Option<Self> {
        debug!(%name, "Phase::from_name: called");
        match name.trim().to_lowercase().as_str() {
            "intro" => Some(Self::Intro),
            "empathy" => Some(Self::Empathy),
            "deepening" => Some(Self::Deepening),
            "generation" => Some(Self::Generation),
            _ => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Step and phase of an interview turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub step: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

impl Meta {
    /// Position with no phase (step 1, or completion)
    pub fn step(step: u8) -> Self {
        Self { step, phase: None }
    }

    /// Position at the given phase of a step
    pub fn at(step: u8, phase: Phase) -> Self {
        Self {
            step,
            phase: Some(phase),
        }
    }

    /// Position at the start of a step; steps 2-6 start at intro
    pub fn start_of(step: u8) -> Self {
        if (FIRST_STEP + 1..=LAST_STEP).contains(&step) {
            Self::at(step, Phase::Intro)
        } else {
            Self::step(step)
        }
    }

    /// True once step 6 has been generated
    pub fn is_complete(&self) -> bool {
        self.step >= COMPLETED_STEP
    }
}

impl Default for Meta {
    fn default() -> Self {
        Self::step(FIRST_STEP)
    }
}

/// Interview topic covered by a step
pub fn step_topic(step: u8) -> &'static str {
    match step {
        1 => "qualification",
        2 => "can",
        3 => "will",
        4 => "must_have",
        5 => "self",
        6 => "synthesis",
        7 => "completed",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_round_trip_names() {
        for phase in [Phase::Intro, Phase::Empathy, Phase::Deepening, Phase::Generation] {
            assert_eq!(Phase::from_name(phase.name()), Some(phase));
        }
        assert_eq!(Phase::from_name(" Deepening "), Some(Phase::Deepening));
        assert_eq!(Phase::from_name("closing"), None);
    }

    #[test]
    fn test_meta_wire_format() {
        let meta: Meta = serde_json::from_str(r#"{"step": 3, "phase": "empathy"}"#).unwrap();
        assert_eq!(meta, Meta::at(3, Phase::Empathy));

        let json = serde_json::to_string(&Meta::step(1)).unwrap();
        assert_eq!(json, r#"{"step":1}"#);
    }

    #[test]
    fn test_start_of() {
        assert_eq!(Meta::start_of(1), Meta::step(1));
        assert_eq!(Meta::start_of(2), Meta::at(2, Phase::Intro));
        assert_eq!(Meta::start_of(6), Meta::at(6, Phase::Intro));
        assert_eq!(Meta::start_of(7), Meta::step(7));
        assert!(Meta::start_of(7).is_complete());
    }
}
