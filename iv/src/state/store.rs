//! Session store interface
//!
//! The phase router and the step-1 adapter only see this trait, so the
//! in-memory actor can be swapped for an external key-value store.

use async_trait::async_trait;

use super::messages::StateResponse;
use super::record::{PendingChoices, PhaseState};

/// Per-session phase state and pending choices, keyed by session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get_phase(&self, session_id: &str) -> StateResponse<Option<PhaseState>>;

    async fn set_phase(&self, session_id: &str, state: PhaseState) -> StateResponse<()>;

    async fn delete_phase(&self, session_id: &str) -> StateResponse<()>;

    async fn get_choices(&self, session_id: &str) -> StateResponse<Option<PendingChoices>>;

    async fn set_choices(&self, session_id: &str, choices: PendingChoices) -> StateResponse<()>;

    async fn delete_choices(&self, session_id: &str) -> StateResponse<()>;
}
