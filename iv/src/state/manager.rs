//! SessionManager - actor that owns the session maps
//!
//! Processes commands via channels. Idle sessions are evicted on a sweep
//! interval once their TTL has passed.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::SessionConfig;

use super::messages::{SessionCommand, SessionCounts, StateError, StateResponse};
use super::record::{PendingChoices, PhaseState};
use super::store::SessionStore;

/// Handle to send commands to the SessionManager
#[derive(Clone)]
pub struct SessionManager {
    tx: mpsc::Sender<SessionCommand>,
}

impl SessionManager {
    /// Spawn a new SessionManager actor
    ///
    /// Must be called from within a tokio runtime. `ttl = None` keeps sessions
    /// for the lifetime of the process.
    pub fn spawn(ttl: Option<Duration>, sweep_interval: Duration) -> Self {
        debug!(?ttl, ?sweep_interval, "spawn: called");
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(actor_loop(Sessions::new(ttl), rx, sweep_interval));

        info!("SessionManager spawned");
        Self { tx }
    }

    /// Spawn using the `session` config section
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::spawn(config.ttl(), config.sweep_interval())
    }

    /// Send a command and wait for its reply
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> SessionCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    /// Live entries in each map
    pub async fn counts(&self) -> StateResponse<SessionCounts> {
        debug!("counts: called");
        self.request(|reply| SessionCommand::Counts { reply }).await
    }

    /// Evict idle sessions now; returns how many sessions were dropped
    pub async fn sweep(&self) -> StateResponse<usize> {
        debug!("sweep: called");
        self.request(|reply| SessionCommand::Sweep { reply }).await
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> StateResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

#[async_trait]
impl SessionStore for SessionManager {
    async fn get_phase(&self, session_id: &str) -> StateResponse<Option<PhaseState>> {
        debug!(%session_id, "get_phase: called");
        let session_id = session_id.to_string();
        self.request(|reply| SessionCommand::GetPhase { session_id, reply }).await
    }

    async fn set_phase(&self, session_id: &str, state: PhaseState) -> StateResponse<()> {
        debug!(%session_id, step = %state.step, phase = %state.phase, cycles = %state.cycles, "set_phase: called");
        let session_id = session_id.to_string();
        self.request(|reply| SessionCommand::SetPhase {
            session_id,
            state,
            reply,
        })
        .await
    }

    async fn delete_phase(&self, session_id: &str) -> StateResponse<()> {
        debug!(%session_id, "delete_phase: called");
        let session_id = session_id.to_string();
        self.request(|reply| SessionCommand::DeletePhase { session_id, reply })
            .await
    }

    async fn get_choices(&self, session_id: &str) -> StateResponse<Option<PendingChoices>> {
        debug!(%session_id, "get_choices: called");
        let session_id = session_id.to_string();
        self.request(|reply| SessionCommand::GetChoices { session_id, reply })
            .await
    }

    async fn set_choices(&self, session_id: &str, choices: PendingChoices) -> StateResponse<()> {
        debug!(%session_id, options = ?choices.options, "set_choices: called");
        let session_id = session_id.to_string();
        self.request(|reply| SessionCommand::SetChoices {
            session_id,
            choices,
            reply,
        })
        .await
    }

    async fn delete_choices(&self, session_id: &str) -> StateResponse<()> {
        debug!(%session_id, "delete_choices: called");
        let session_id = session_id.to_string();
        self.request(|reply| SessionCommand::DeleteChoices { session_id, reply })
            .await
    }
}

/// The maps owned by the actor
struct Sessions {
    phases: HashMap<String, PhaseState>,
    choices: HashMap<String, PendingChoices>,
    /// Last command touching each session
    last_seen: HashMap<String, Instant>,
    ttl: Option<Duration>,
}

impl Sessions {
    fn new(ttl: Option<Duration>) -> Self {
        Self {
            phases: HashMap::new(),
            choices: HashMap::new(),
            last_seen: HashMap::new(),
            ttl,
        }
    }

    fn touch(&mut self, session_id: &str) {
        self.last_seen.insert(session_id.to_string(), Instant::now());
    }

    /// Drop bookkeeping for a session once neither map holds it
    fn forget_if_empty(&mut self, session_id: &str) {
        if !self.phases.contains_key(session_id) && !self.choices.contains_key(session_id) {
            self.last_seen.remove(session_id);
        }
    }

    fn counts(&self) -> SessionCounts {
        SessionCounts {
            phases: self.phases.len(),
            choices: self.choices.len(),
        }
    }

    /// Remove every session idle for longer than the TTL
    fn evict_idle(&mut self) -> usize {
        let Some(ttl) = self.ttl else {
            return 0;
        };
        let now = Instant::now();
        let expired: Vec<String> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.duration_since(**seen) > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.phases.remove(id);
            self.choices.remove(id);
            self.last_seen.remove(id);
        }
        if !expired.is_empty() {
            info!(evicted = expired.len(), "Evicted idle sessions");
        }
        expired.len()
    }

    fn apply(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::GetPhase { session_id, reply } => {
                debug!(%session_id, "actor_loop: GetPhase command");
                let state = self.phases.get(&session_id).cloned();
                if state.is_some() {
                    self.touch(&session_id);
                }
                let _ = reply.send(Ok(state));
            }

            SessionCommand::SetPhase {
                session_id,
                state,
                reply,
            } => {
                debug!(%session_id, "actor_loop: SetPhase command");
                self.touch(&session_id);
                self.phases.insert(session_id, state);
                let _ = reply.send(Ok(()));
            }

            SessionCommand::DeletePhase { session_id, reply } => {
                debug!(%session_id, "actor_loop: DeletePhase command");
                self.phases.remove(&session_id);
                self.forget_if_empty(&session_id);
                let _ = reply.send(Ok(()));
            }

            SessionCommand::GetChoices { session_id, reply } => {
                debug!(%session_id, "actor_loop: GetChoices command");
                let choices = self.choices.get(&session_id).cloned();
                if choices.is_some() {
                    self.touch(&session_id);
                }
                let _ = reply.send(Ok(choices));
            }

            SessionCommand::SetChoices {
                session_id,
                choices,
                reply,
            } => {
                debug!(%session_id, "actor_loop: SetChoices command");
                self.touch(&session_id);
                self.choices.insert(session_id, choices);
                let _ = reply.send(Ok(()));
            }

            SessionCommand::DeleteChoices { session_id, reply } => {
                debug!(%session_id, "actor_loop: DeleteChoices command");
                self.choices.remove(&session_id);
                self.forget_if_empty(&session_id);
                let _ = reply.send(Ok(()));
            }

            SessionCommand::Counts { reply } => {
                debug!("actor_loop: Counts command");
                let _ = reply.send(Ok(self.counts()));
            }

            SessionCommand::Sweep { reply } => {
                debug!("actor_loop: Sweep command");
                let _ = reply.send(Ok(self.evict_idle()));
            }

            // Handled by the loop
            SessionCommand::Shutdown => {}
        }
    }
}

async fn actor_loop(mut sessions: Sessions, mut rx: mpsc::Receiver<SessionCommand>, sweep_interval: Duration) {
    debug!("actor_loop: called");
    debug!("SessionManager actor started");

    let mut ticker = tokio::time::interval(sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let sweeping = sessions.ttl.is_some();

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(SessionCommand::Shutdown) => {
                    info!("SessionManager shutting down");
                    break;
                }
                Some(cmd) => sessions.apply(cmd),
                None => {
                    debug!("actor_loop: all handles dropped");
                    break;
                }
            },
            _ = ticker.tick(), if sweeping => {
                sessions.evict_idle();
            }
        }
    }

    debug!("SessionManager actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Phase;

    fn manager() -> SessionManager {
        SessionManager::spawn(None, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_phase_crud() {
        let manager = manager();

        assert!(manager.get_phase("s1").await.unwrap().is_none());

        let mut state = PhaseState::fresh(2);
        state.phase = Phase::Deepening;
        state.cycles = 1;
        manager.set_phase("s1", state.clone()).await.unwrap();

        assert_eq!(manager.get_phase("s1").await.unwrap(), Some(state));
        assert!(manager.get_phase("s2").await.unwrap().is_none());

        manager.delete_phase("s1").await.unwrap();
        assert!(manager.get_phase("s1").await.unwrap().is_none());

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_choices_crud_independent_of_phase() {
        let manager = manager();

        manager
            .set_choices("s1", PendingChoices::new(vec!["正看護師".into(), "准看護師".into()]))
            .await
            .unwrap();
        manager.set_phase("s1", PhaseState::fresh(2)).await.unwrap();
        manager.delete_phase("s1").await.unwrap();

        let choices = manager.get_choices("s1").await.unwrap().unwrap();
        assert_eq!(choices.options, vec!["正看護師", "准看護師"]);
        assert_eq!(
            manager.counts().await.unwrap(),
            SessionCounts { phases: 0, choices: 1 }
        );

        manager.delete_choices("s1").await.unwrap();
        assert!(manager.get_choices("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_sessions() {
        let manager = SessionManager::spawn(Some(Duration::from_millis(20)), Duration::from_secs(3600));

        manager.set_phase("old", PhaseState::fresh(3)).await.unwrap();
        manager
            .set_choices("old", PendingChoices::new(vec!["a".into()]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.set_phase("new", PhaseState::fresh(2)).await.unwrap();

        assert_eq!(manager.sweep().await.unwrap(), 1);
        assert!(manager.get_phase("old").await.unwrap().is_none());
        assert!(manager.get_choices("old").await.unwrap().is_none());
        assert!(manager.get_phase("new").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_no_ttl_never_evicts() {
        let manager = manager();
        manager.set_phase("s1", PhaseState::fresh(4)).await.unwrap();
        assert_eq!(manager.sweep().await.unwrap(), 0);
        assert!(manager.get_phase("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_fail() {
        let manager = manager();
        manager.shutdown().await.unwrap();
        tokio::task::yield_now().await;

        let result = manager.get_phase("s1").await;
        assert!(matches!(result, Err(StateError::ChannelError)));
    }
}
