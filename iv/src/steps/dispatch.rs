//! Interview dispatcher
//!
//! Entry point for a turn: checks the step, serializes turns of the same
//! session and hands the request to the step's handler.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use eyre::{Context, Result};
use tagmatch::{ReferenceData, TagMatcher};
use tracing::{debug, info};

use crate::config::{Config, MustHaveMode};
use crate::domain::{FIRST_STEP, LAST_STEP};
use crate::llm::{LlmClient, create_client};
use crate::prompts::PromptLoader;
use crate::state::{SessionManager, SessionStore};

use super::must_have::{MUST_HAVE_STEP, MustHaveStep};
use super::qualification::QualificationStep;
use super::router::{PhaseRouter, RouterSettings};
use super::{InterviewError, StepHandler, TurnRequest, TurnResponse};

/// Per-session turn locks
type SessionLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// The interview engine
pub struct Interview {
    handlers: BTreeMap<u8, Arc<dyn StepHandler>>,
    locks: SessionLocks,
}

/// Steps that need a prompt template under the given must-have mode
pub fn prompt_steps(mode: MustHaveMode) -> Vec<u8> {
    (FIRST_STEP + 1..=LAST_STEP)
        .filter(|step| *step != MUST_HAVE_STEP || mode == MustHaveMode::Conversation)
        .collect()
}

impl Interview {
    /// Wire the standard handlers
    pub fn new(
        matcher: Arc<TagMatcher>,
        prompts: Arc<PromptLoader>,
        llm: Arc<dyn LlmClient>,
        store: Arc<dyn SessionStore>,
        settings: RouterSettings,
        must_have_mode: MustHaveMode,
    ) -> Self {
        debug!(?must_have_mode, "Interview::new: called");
        let router: Arc<dyn StepHandler> = Arc::new(PhaseRouter::new(
            llm,
            prompts,
            store.clone(),
            MustHaveStep::new(matcher.clone()),
            settings,
        ));

        let mut handlers: BTreeMap<u8, Arc<dyn StepHandler>> = BTreeMap::new();
        handlers.insert(FIRST_STEP, Arc::new(QualificationStep::new(matcher.clone(), store)));
        for step in FIRST_STEP + 1..=LAST_STEP {
            handlers.insert(step, router.clone());
        }
        if must_have_mode == MustHaveMode::Keywords {
            handlers.insert(MUST_HAVE_STEP, Arc::new(MustHaveStep::new(matcher)));
        }

        Self {
            handlers,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Build everything from config
    ///
    /// Reference data and prompts are loaded here, so configuration problems
    /// fail before the first turn. Must be called within a tokio runtime.
    pub fn from_config(config: &Config) -> Result<Self> {
        debug!("Interview::from_config: called");
        let data = ReferenceData::load(&config.data.qualifications, &config.data.licenses, &config.data.tags)
            .context("Failed to load reference data")?;
        let matcher = Arc::new(TagMatcher::new(&data));

        let prompts = PromptLoader::open(&config.prompts.dir, prompt_steps(config.steps.must_have))
            .context("Failed to load prompt templates")?;

        let llm = create_client(&config.llm).context("Failed to create LLM client")?;
        let store = Arc::new(SessionManager::from_config(&config.session));

        info!(provider = %config.llm.provider, model = %config.llm.model, "Interview ready");
        Ok(Self::new(
            matcher,
            Arc::new(prompts),
            llm,
            store,
            RouterSettings::from_config(config),
            config.steps.must_have,
        ))
    }

    /// Handle one turn
    pub async fn turn(&self, request: TurnRequest) -> Result<TurnResponse, InterviewError> {
        let step = request.meta.step;
        debug!(session_id = %request.session_id, %step, "Interview::turn: called");
        let handler = self
            .handlers
            .get(&step)
            .cloned()
            .ok_or(InterviewError::UnsupportedStep(step))?;

        let turn = SessionTurn::enter(&self.locks, &request.session_id);
        let result = {
            let _guard = turn.lock().lock().await;
            handler.handle(&request).await
        };
        drop(turn);

        let response = result?;
        debug!(from = %step, to = %response.meta.step, "Interview::turn: done");
        Ok(response)
    }
}

/// A session's turn lock, forgotten on drop once no other turn holds it
///
/// Dropping also covers a cancelled turn future.
struct SessionTurn<'a> {
    locks: &'a SessionLocks,
    session_id: &'a str,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl<'a> SessionTurn<'a> {
    fn enter(locks: &'a SessionLocks, session_id: &'a str) -> Self {
        let lock = {
            let mut map = locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(session_id.to_string()).or_default().clone()
        };
        Self { locks, session_id, lock }
    }

    fn lock(&self) -> &tokio::sync::Mutex<()> {
        &self.lock
    }
}

impl Drop for SessionTurn<'_> {
    fn drop(&mut self) {
        // Clones are only handed out under the map lock: two means the map and us
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(self.session_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Meta, Phase, Status};
    use crate::llm::client::mock::MockLlmClient;
    use crate::steps::test_support::{matcher, prompts};
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn interview(llm: MockLlmClient, mode: MustHaveMode) -> Interview {
        Interview::new(
            Arc::new(matcher()),
            Arc::new(prompts()),
            Arc::new(llm),
            Arc::new(SessionManager::spawn(None, Duration::from_secs(60))),
            RouterSettings::default(),
            mode,
        )
    }

    #[tokio::test]
    async fn test_rejects_steps_outside_range() {
        let iv = interview(MockLlmClient::texts(Vec::<String>::new()), MustHaveMode::Conversation);
        for step in [0, 7, 9] {
            let result = iv.turn(TurnRequest::new("s", Status::default(), Meta::step(step), "x")).await;
            assert!(matches!(result, Err(InterviewError::UnsupportedStep(s)) if s == step));
        }
    }

    #[tokio::test]
    async fn test_step1_then_router() {
        let iv = interview(MockLlmClient::texts([r#"{"response": "できることを教えてください"}"#]), MustHaveMode::Conversation);

        let first = iv
            .turn(TurnRequest::new("s", Status::default(), Meta::step(1), "ナース"))
            .await
            .unwrap();
        assert_eq!(first.meta, Meta::at(2, Phase::Intro));

        let second = iv.turn(TurnRequest::new("s", first.status, first.meta, "")).await.unwrap();
        assert_eq!(second.meta, Meta::at(2, Phase::Empathy));
        assert_eq!(second.status.qual_ids, Some(BTreeSet::from([101])));
        assert_eq!(second.response.as_deref(), Some("できることを教えてください"));
    }

    #[tokio::test]
    async fn test_keywords_mode_skips_llm_for_step4() {
        let llm = MockLlmClient::texts(Vec::<String>::new());
        let iv = interview(llm, MustHaveMode::Keywords);

        let response = iv
            .turn(TurnRequest::new("s", Status::default(), Meta::step(4), "残業ゼロ、夜勤なし"))
            .await
            .unwrap();
        assert_eq!(response.meta, Meta::at(5, Phase::Intro));
        assert_eq!(response.status.must_have_ids, Some(BTreeSet::from([2])));
    }

    #[tokio::test]
    async fn test_locks_released_after_turn() {
        let iv = interview(MockLlmClient::texts(Vec::<String>::new()), MustHaveMode::Conversation);
        iv.turn(TurnRequest::new("s", Status::default(), Meta::step(1), "ナース"))
            .await
            .unwrap();
        assert!(iv.locks.lock().unwrap().is_empty());
    }

    /// Never answers
    struct StalledLlm;

    #[async_trait::async_trait]
    impl LlmClient for StalledLlm {
        async fn complete(
            &self,
            _request: crate::llm::CompletionRequest,
        ) -> Result<crate::llm::CompletionResponse, crate::llm::LlmError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_locks_released_when_turn_cancelled() {
        let iv = Interview::new(
            Arc::new(matcher()),
            Arc::new(prompts()),
            Arc::new(StalledLlm),
            Arc::new(SessionManager::spawn(None, Duration::from_secs(60))),
            RouterSettings::default(),
            MustHaveMode::Conversation,
        );

        let turn = iv.turn(TurnRequest::new("s", Status::default(), Meta::step(2), ""));
        assert!(tokio::time::timeout(Duration::from_millis(20), turn).await.is_err());
        assert!(iv.locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_turns_same_session_serialized() {
        let replies = (0..4).map(|i| format!(r#"{{"response": "reply {}"}}"#, i));
        let iv = Arc::new(interview(MockLlmClient::texts(replies), MustHaveMode::Conversation));

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let iv = iv.clone();
            tasks.push(tokio::spawn(async move {
                iv.turn(TurnRequest::new("shared", Status::default(), Meta::step(3), "答え"))
                    .await
                    .unwrap()
            }));
        }
        let mut phases = Vec::new();
        for task in tasks {
            phases.push(task.await.unwrap().meta.phase);
        }

        // intro, empathy, deepening, empathy: each turn saw the previous one
        let deepening = phases.iter().filter(|p| **p == Some(Phase::Deepening)).count();
        let empathy = phases.iter().filter(|p| **p == Some(Phase::Empathy)).count();
        assert_eq!(deepening, 2);
        assert_eq!(empathy, 2);
    }

    #[test]
    fn test_prompt_steps() {
        assert_eq!(prompt_steps(MustHaveMode::Conversation), vec![2, 3, 4, 5, 6]);
        assert_eq!(prompt_steps(MustHaveMode::Keywords), vec![2, 3, 5, 6]);
    }
}
