//! Session state with actor pattern
//!
//! SessionManager owns the in-memory session maps and processes messages via
//! channels. Callers depend on the [`SessionStore`] trait.

mod manager;
mod messages;
mod record;
mod store;

pub use manager::SessionManager;
pub use messages::{SessionCommand, SessionCounts, StateError, StateResponse};
pub use record::{Exchange, MAX_CHOICE_OPTIONS, PendingChoices, PhaseState};
pub use store::SessionStore;
