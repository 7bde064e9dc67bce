//! Interactive interview REPL
//!
//! Drives the [`Interview`] from a terminal, one line per turn.

mod session;

pub use session::ReplSession;

use std::sync::Arc;

use eyre::Result;
use tracing::info;

use crate::config::Config;
use crate::steps::Interview;

/// Run the interactive interview
///
/// This is the main entry point for `iv chat`.
pub async fn run_interactive(config: &Config, session_id: Option<String>) -> Result<()> {
    let interview = Arc::new(Interview::from_config(config)?);
    let session_id = session_id.unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
    info!(%session_id, "Starting interactive interview");

    let mut session = ReplSession::new(interview, session_id);
    session.run().await
}
