//! Session phase router
//!
//! Drives steps 2-6 through `intro -> empathy -> deepening -> generation`.
//! Deepening loops back to empathy until the model marks the answer as detailed
//! enough or [`MAX_CYCLES`] turns have passed. Invalid or failed model output
//! never stops the interview: it is retried, then degraded.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{FIRST_STEP, LAST_STEP, Meta, Phase};
use crate::llm::{CompletionRequest, LlmClient, Message, Role};
use crate::prompts::{PromptContext, PromptLoader};
use crate::state::{Exchange, PhaseState, SessionStore};
use crate::validation::{
    ConversationOutcome, ConversationRules, FINAL_ATTEMPT, GenerationOutcome, parse_conversation, parse_generation,
    validate_conversation_output, validate_generation_output,
};

use super::must_have::{MUST_HAVE_STEP, MustHaveStep};
use super::turn::DEGRADED_RESPONSE;
use super::{InterviewError, StepHandler, TurnRequest, TurnResponse};

/// Deepening turns before generation is forced
pub const MAX_CYCLES: u8 = 3;

/// Model calls per phase before degrading
pub const MAX_ATTEMPTS: u32 = FINAL_ATTEMPT;

/// Sent in place of a blank user turn
pub const CONTINUE_MESSAGE: &str = "続けてください。";

/// Router tunables taken from config
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub sufficient_marker: String,
    pub rules: ConversationRules,
    pub max_tokens: u32,
}

impl RouterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sufficient_marker: config.conversation.sufficient_marker.clone(),
            rules: ConversationRules::from_config(&config.conversation),
            max_tokens: config.llm.max_tokens,
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Phase state machine for the LLM-backed steps
pub struct PhaseRouter {
    llm: Arc<dyn LlmClient>,
    prompts: Arc<PromptLoader>,
    store: Arc<dyn SessionStore>,
    must_have: MustHaveStep,
    settings: RouterSettings,
}

impl PhaseRouter {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        prompts: Arc<PromptLoader>,
        store: Arc<dyn SessionStore>,
        must_have: MustHaveStep,
        settings: RouterSettings,
    ) -> Self {
        Self {
            llm,
            prompts,
            store,
            must_have,
            settings,
        }
    }

    /// Steps this router accepts
    pub fn handles(step: u8) -> bool {
        (FIRST_STEP + 1..=LAST_STEP).contains(&step)
    }

    /// Build the model request for one phase
    fn build_request(
        &self,
        request: &TurnRequest,
        state: &PhaseState,
        phase: Phase,
        current: Option<&str>,
    ) -> Result<CompletionRequest, InterviewError> {
        let context = PromptContext::new(
            state.step,
            phase,
            &request.status,
            Meta::at(state.step, phase),
            &request.user_message,
            state.cycles,
            MAX_CYCLES,
            &state.history,
            &self.settings.sufficient_marker,
        );
        let system_prompt = self.prompts.render(&context)?;
        Ok(CompletionRequest {
            system_prompt,
            messages: build_messages(&state.history, current),
            max_tokens: self.settings.max_tokens,
        })
    }

    /// Call the model, returning its text or `None` on a call failure
    async fn call(&self, request: &CompletionRequest, phase: Phase, attempt: u32) -> Option<String> {
        match self.llm.complete(request.clone()).await {
            Ok(response) => Some(response.content.unwrap_or_default()),
            Err(e) => {
                warn!(%phase, %attempt, retryable = e.is_retryable(), error = %e, "LLM call failed");
                None
            }
        }
    }

    /// Run a conversation phase; `None` once every attempt failed
    async fn converse(
        &self,
        request: &TurnRequest,
        state: &PhaseState,
        phase: Phase,
    ) -> Result<Option<String>, InterviewError> {
        debug!(step = %state.step, %phase, cycles = %state.cycles, "converse: called");
        let completion = self.build_request(request, state, phase, Some(&request.user_message))?;

        for attempt in 1..=MAX_ATTEMPTS {
            let Some(raw) = self.call(&completion, phase, attempt).await else {
                continue;
            };
            let parsed = parse_conversation(&raw);
            match validate_conversation_output(phase, parsed.as_ref(), &self.settings.rules) {
                ConversationOutcome::Accepted { response } => return Ok(Some(response)),
                outcome => warn!(%phase, %attempt, ?outcome, "Conversation output rejected"),
            }
        }

        warn!(step = %state.step, %phase, "Conversation degraded to empty response");
        Ok(None)
    }

    /// Run generation and finish the step
    async fn generate(
        &self,
        request: &TurnRequest,
        mut state: PhaseState,
        response: Option<String>,
        mut degraded: Vec<String>,
    ) -> Result<TurnResponse, InterviewError> {
        let step = state.step;
        debug!(%step, history_len = state.history.len(), "generate: called");

        // A stored generation phase has not seen the current message yet
        let current = match response {
            Some(_) => None,
            None => Some(request.user_message.as_str()),
        };
        let completion = self.build_request(request, &state, Phase::Generation, current)?;

        let mut attempt = 1;
        let (mut patch, blanked) = loop {
            let parsed = match self.call(&completion, Phase::Generation, attempt).await {
                Some(raw) => parse_generation(&raw),
                None => None,
            };
            match validate_generation_output(step, parsed.as_ref(), attempt) {
                GenerationOutcome::Accepted { status } => break (status, Vec::new()),
                GenerationOutcome::Degraded { status, blanked } => break (status, blanked),
                outcome => {
                    warn!(%step, %attempt, ?outcome, "Generation output rejected");
                    attempt += 1;
                }
            }
        };

        if step == MUST_HAVE_STEP {
            if let Some(message) = current {
                state.history.push(Exchange::new(message, ""));
            }
            let answers: Vec<&str> = state.user_text().collect();
            patch.merge(self.must_have.patch(&answers.join("\n")));
        }

        degraded.extend(blanked.iter().map(|field| field.key().to_string()));
        self.store.delete_phase(&request.session_id).await?;

        let status = request.status.clone().merged(patch);
        let meta = Meta::start_of(step + 1);
        info!(session_id = %request.session_id, %step, next_step = %meta.step, ?degraded, "Step generated");

        let mut turn = TurnResponse::new(status, meta).with_degraded(degraded);
        turn.response = response;
        Ok(turn)
    }

    /// Strip the sufficient-detail marker; report whether it was present
    fn take_marker(&self, response: &str) -> (String, bool) {
        let marker = self.settings.sufficient_marker.as_str();
        if marker.is_empty() || !response.contains(marker) {
            return (response.to_string(), false);
        }
        (response.replace(marker, "").trim().to_string(), true)
    }
}

#[async_trait]
impl StepHandler for PhaseRouter {
    async fn handle(&self, request: &TurnRequest) -> Result<TurnResponse, InterviewError> {
        let step = request.meta.step;
        let session_id = request.session_id.as_str();
        debug!(%session_id, %step, "PhaseRouter::handle: called");
        if !Self::handles(step) {
            return Err(InterviewError::UnsupportedStep(step));
        }

        let stored = self.store.get_phase(session_id).await?;
        let mut state = PhaseState::resume(stored, step);
        let phase = state.phase;

        if phase == Phase::Generation {
            return self.generate(request, state, None, Vec::new()).await;
        }

        let reply = self.converse(request, &state, phase).await?;
        let mut degraded = Vec::new();
        let (response, sufficient) = match reply {
            Some(reply) => self.take_marker(&reply),
            None => {
                degraded.push(DEGRADED_RESPONSE.to_string());
                (String::new(), false)
            }
        };

        let next = match phase {
            Phase::Intro => Phase::Empathy,
            Phase::Empathy => Phase::Deepening,
            Phase::Deepening => {
                state.cycles = (state.cycles + 1).min(MAX_CYCLES);
                if sufficient || state.cycles >= MAX_CYCLES {
                    debug!(%sufficient, cycles = %state.cycles, "PhaseRouter::handle: deepening complete");
                    Phase::Generation
                } else {
                    Phase::Empathy
                }
            }
            Phase::Generation => Phase::Generation,
        };

        state.history.push(Exchange::new(request.user_message.as_str(), response.as_str()));
        state.phase = next;
        info!(%session_id, %step, from = %phase, to = %next, cycles = %state.cycles, "Phase advanced");

        if next == Phase::Generation {
            return self.generate(request, state, Some(response), degraded).await;
        }

        self.store.set_phase(session_id, state).await?;
        Ok(TurnResponse::new(request.status.clone(), Meta::at(step, next))
            .with_response(response)
            .with_degraded(degraded))
    }
}

/// History as alternating messages, ending with a user turn
///
/// Blank texts are skipped and same-role neighbours joined, so the provider
/// always sees a well-formed user/assistant alternation.
fn build_messages(history: &[Exchange], current: Option<&str>) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();
    let mut push = |role: Role, text: &str| {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push('\n');
                last.content.push_str(text);
            }
            _ => messages.push(Message { role, content: text.to_string() }),
        }
    };

    for exchange in history {
        push(Role::User, &exchange.user);
        push(Role::Assistant, &exchange.assistant);
    }
    if let Some(current) = current {
        push(Role::User, current);
    }

    if messages.first().is_some_and(|m| m.role == Role::Assistant) {
        messages.insert(0, Message::user(CONTINUE_MESSAGE));
    }
    if messages.last().is_none_or(|m| m.role == Role::Assistant) {
        messages.push(Message::user(CONTINUE_MESSAGE));
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Status, TextField};
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use crate::state::SessionManager;
    use crate::steps::test_support::{matcher, prompts};
    use std::collections::BTreeSet;
    use std::time::Duration;

    struct Harness {
        router: PhaseRouter,
        llm: Arc<MockLlmClient>,
        store: SessionManager,
    }

    fn harness(replies: Vec<MockReply>) -> Harness {
        let llm = Arc::new(MockLlmClient::scripted(replies));
        let store = SessionManager::spawn(None, Duration::from_secs(60));
        let router = PhaseRouter::new(
            llm.clone(),
            Arc::new(prompts()),
            Arc::new(store.clone()),
            MustHaveStep::new(Arc::new(matcher())),
            RouterSettings::default(),
        );
        Harness { router, llm, store }
    }

    fn text(reply: &str) -> MockReply {
        MockReply::Text(reply.to_string())
    }

    fn response(reply: &str) -> MockReply {
        text(&serde_json::json!({ "response": reply }).to_string())
    }

    fn request(step: u8, message: &str) -> TurnRequest {
        TurnRequest::new("s1", Status::default(), Meta::step(step), message)
    }

    fn chars(n: usize) -> String {
        "あ".repeat(n)
    }

    #[tokio::test]
    async fn test_phase_sequence_intro_empathy_deepening() {
        let h = harness(vec![
            response("どんな経験がありますか？"),
            response("それは大変でしたね。"),
            response("具体的にはどんな場面でしたか？"),
        ]);

        let intro = h.router.handle(&request(2, "")).await.unwrap();
        assert_eq!(intro.meta, Meta::at(2, Phase::Empathy));
        assert_eq!(intro.response.as_deref(), Some("どんな経験がありますか？"));

        let empathy = h.router.handle(&request(2, "病棟で5年")).await.unwrap();
        assert_eq!(empathy.meta, Meta::at(2, Phase::Deepening));

        let deepening = h.router.handle(&request(2, "急変対応です")).await.unwrap();
        assert_eq!(deepening.meta, Meta::at(2, Phase::Empathy));

        let state = h.store.get_phase("s1").await.unwrap().unwrap();
        assert_eq!(state.cycles, 1);
        assert_eq!(state.history.len(), 3);
        assert_eq!(h.llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_deepening_forces_generation_after_max_cycles() {
        let mut replies = vec![response("質問です？")];
        for _ in 0..MAX_CYCLES {
            replies.push(response("わかります。"));
            replies.push(response("もう少し詳しく教えてください？"));
        }
        replies.push(text(&serde_json::json!({ "can_text": chars(70) }).to_string()));
        let h = harness(replies);

        h.router.handle(&request(2, "")).await.unwrap();
        for cycle in 1..=MAX_CYCLES {
            let empathy = h.router.handle(&request(2, "答え")).await.unwrap();
            assert_eq!(empathy.meta.phase, Some(Phase::Deepening));
            let deepening = h.router.handle(&request(2, "詳細")).await.unwrap();
            if cycle < MAX_CYCLES {
                assert_eq!(deepening.meta, Meta::at(2, Phase::Empathy));
            } else {
                assert_eq!(deepening.meta, Meta::at(3, Phase::Intro));
                assert_eq!(deepening.status.can_text, Some(chars(70)));
                assert_eq!(deepening.response.as_deref(), Some("もう少し詳しく教えてください？"));
            }
        }
        assert!(h.store.get_phase("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_marker_moves_to_generation_early() {
        let h = harness(vec![
            response("どうぞ"),
            response("素晴らしい経験ですね。"),
            response("よくわかりました。[[SUFFICIENT]]"),
            text(&serde_json::json!({ "status": { "will_text": chars(80) } }).to_string()),
        ]);

        h.router.handle(&request(3, "")).await.unwrap();
        h.router.handle(&request(3, "管理職を目指したい")).await.unwrap();
        let done = h.router.handle(&request(3, "3年以内に")).await.unwrap();

        assert_eq!(done.meta, Meta::at(4, Phase::Intro));
        assert_eq!(done.response.as_deref(), Some("よくわかりました。"));
        assert_eq!(done.status.will_text, Some(chars(80)));
        assert!(!done.is_degraded());
    }

    #[tokio::test]
    async fn test_invalid_conversation_retried_then_degraded() {
        let h = harness(vec![
            response("大丈夫ですか？"),
            MockReply::Fail,
            response("ok"),
        ]);
        // Skip intro
        let mut state = PhaseState::fresh(2);
        state.phase = Phase::Empathy;
        h.store.set_phase("s1", state).await.unwrap();

        let turn = h.router.handle(&request(2, "答え")).await.unwrap();
        assert_eq!(turn.response.as_deref(), Some(""));
        assert_eq!(turn.degraded, vec![DEGRADED_RESPONSE]);
        assert_eq!(turn.meta, Meta::at(2, Phase::Deepening));
        assert_eq!(h.llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_second_attempt_accepted() {
        let h = harness(vec![response("   "), response("はじめましょう")]);
        let turn = h.router.handle(&request(5, "")).await.unwrap();
        assert_eq!(turn.response.as_deref(), Some("はじめましょう"));
        assert!(!turn.is_degraded());
    }

    #[tokio::test]
    async fn test_generation_forced_success_blanks_field() {
        let h = harness(vec![
            text(&serde_json::json!({ "self_text": chars(20) }).to_string()),
            MockReply::Fail,
        ]);
        let mut state = PhaseState::fresh(5);
        state.phase = Phase::Generation;
        h.store.set_phase("s1", state).await.unwrap();

        let turn = h.router.handle(&request(5, "以上です")).await.unwrap();
        assert_eq!(turn.meta, Meta::at(6, Phase::Intro));
        assert_eq!(turn.status.self_text.as_deref(), Some(""));
        assert!(turn.degraded_field(TextField::SelfText));
        assert!(turn.response.is_none());
    }

    #[tokio::test]
    async fn test_step6_completes_interview() {
        let h = harness(vec![text(
            &serde_json::json!({ "doing_text": chars(300), "being_text": chars(300) }).to_string(),
        )]);
        let mut state = PhaseState::fresh(6);
        state.phase = Phase::Generation;
        h.store.set_phase("s1", state).await.unwrap();

        let turn = h.router.handle(&request(6, "まとめてください")).await.unwrap();
        assert_eq!(turn.meta, Meta::step(7));
        assert!(turn.meta.is_complete());
        assert_eq!(turn.status.doing_text, Some(chars(300)));
    }

    #[tokio::test]
    async fn test_must_have_ids_come_from_user_text() {
        let h = harness(vec![
            response("条件を教えてください"),
            response("大切な条件ですね。"),
            response("ほかにありますか？[[SUFFICIENT]]"),
            text(&serde_json::json!({ "must_have_text": chars(70), "must_have_ids": [99] }).to_string()),
        ]);

        h.router.handle(&request(4, "")).await.unwrap();
        h.router.handle(&request(4, "夜勤なしが絶対です")).await.unwrap();
        let done = h.router.handle(&request(4, "ボーナスも欲しい")).await.unwrap();

        assert_eq!(done.meta.step, 5);
        assert_eq!(done.status.must_have_ids, Some(BTreeSet::from([1, 2])));
        assert_eq!(done.status.must_have_text, Some(chars(70)));
    }

    #[tokio::test]
    async fn test_step_change_resets_state() {
        let h = harness(vec![response("ステップ3の質問"), response("ステップ2の質問")]);
        let mut state = PhaseState::fresh(2);
        state.phase = Phase::Deepening;
        state.cycles = 2;
        h.store.set_phase("s1", state).await.unwrap();

        let turn = h.router.handle(&request(3, "")).await.unwrap();
        assert_eq!(turn.meta, Meta::at(3, Phase::Empathy));
        let state = h.store.get_phase("s1").await.unwrap().unwrap();
        assert_eq!(state.step, 3);
        assert_eq!(state.cycles, 0);
    }

    #[tokio::test]
    async fn test_unsupported_steps_rejected() {
        let h = harness(vec![]);
        for step in [0, 1, 7] {
            let result = h.router.handle(&request(step, "x")).await;
            assert!(matches!(result, Err(InterviewError::UnsupportedStep(s)) if s == step));
        }
        assert_eq!(h.llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_request_carries_rendered_prompt_and_history() {
        let h = harness(vec![response("質問"), response("共感です。")]);
        h.router.handle(&request(2, "")).await.unwrap();
        h.router.handle(&request(2, "私の答え")).await.unwrap();

        let requests = h.llm.requests();
        assert_eq!(requests[0].system_prompt, "step2 intro cycles=0");
        assert_eq!(requests[0].messages, vec![Message::user(CONTINUE_MESSAGE)]);
        assert_eq!(requests[1].system_prompt, "step2 empathy cycles=0");
        assert_eq!(
            requests[1].messages,
            vec![Message::user(CONTINUE_MESSAGE), Message::assistant("質問"), Message::user("私の答え")]
        );
    }

    #[test]
    fn test_build_messages_joins_and_terminates() {
        let history = vec![Exchange::new("a", "b"), Exchange::new("c", ""), Exchange::new("d", "e")];
        let messages = build_messages(&history, None);
        assert_eq!(
            messages,
            vec![
                Message::user("a"),
                Message::assistant("b"),
                Message::user("c\nd"),
                Message::assistant("e"),
                Message::user(CONTINUE_MESSAGE),
            ]
        );
    }
}
