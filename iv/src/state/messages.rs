//! Session manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use super::record::{PendingChoices, PhaseState};

/// Errors from session store operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Channel error")]
    ChannelError,
}

/// Response from session store operations
pub type StateResponse<T> = Result<T, StateError>;

/// Number of live entries in each map
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounts {
    pub phases: usize,
    pub choices: usize,
}

/// Commands sent to the SessionManager actor
#[derive(Debug)]
pub enum SessionCommand {
    // Phase state operations
    GetPhase {
        session_id: String,
        reply: oneshot::Sender<StateResponse<Option<PhaseState>>>,
    },
    SetPhase {
        session_id: String,
        state: PhaseState,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    DeletePhase {
        session_id: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Pending choice operations
    GetChoices {
        session_id: String,
        reply: oneshot::Sender<StateResponse<Option<PendingChoices>>>,
    },
    SetChoices {
        session_id: String,
        choices: PendingChoices,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    DeleteChoices {
        session_id: String,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Maintenance
    Counts {
        reply: oneshot::Sender<StateResponse<SessionCounts>>,
    },
    Sweep {
        reply: oneshot::Sender<StateResponse<usize>>,
    },

    // Shutdown
    Shutdown,
}
