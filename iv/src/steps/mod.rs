//! Step handlers
//!
//! Every step is served by a [`StepHandler`]. Step 1 and (optionally) step 4
//! resolve deterministically from reference data; the rest go through the
//! [`PhaseRouter`]. [`Interview`] picks the handler by step number.

use async_trait::async_trait;

mod dispatch;
mod error;
mod must_have;
mod qualification;
mod router;
mod turn;

#[cfg(test)]
mod test_support;

pub use dispatch::{Interview, prompt_steps};
pub use error::InterviewError;
pub use must_have::{MUST_HAVE_STEP, MustHaveStep};
pub use qualification::{ASK_QUALIFICATION, QualificationStep, format_choice_prompt};
pub use router::{CONTINUE_MESSAGE, MAX_ATTEMPTS, MAX_CYCLES, PhaseRouter, RouterSettings};
pub use turn::{DEGRADED_RESPONSE, Drill, TurnRequest, TurnResponse};

/// Strategy for one interview step
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Process one turn and return the caller's next status and position
    async fn handle(&self, request: &TurnRequest) -> Result<TurnResponse, InterviewError>;
}
