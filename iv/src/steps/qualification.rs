//! Step 1: qualification resolution
//!
//! Deterministic, no LLM. Free text is resolved to license labels; when it is
//! ambiguous the user is asked to pick one of at most six candidates.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tagmatch::{TagMatcher, normalize, unique_options};
use tracing::{debug, info};

use crate::domain::{FIRST_STEP, Meta, Status};
use crate::state::{PendingChoices, SessionStore};

use super::{Drill, InterviewError, StepHandler, TurnRequest, TurnResponse};

/// Asked again when the reply is blank
pub const ASK_QUALIFICATION: &str = "お持ちの資格を教えてください。";

/// Render a choice prompt: `『［A］／［B］』`
pub fn format_choice_prompt<S: AsRef<str>>(options: &[S]) -> String {
    let inner: Vec<String> = options.iter().map(|o| format!("［{}］", o.as_ref())).collect();
    format!("『{}』", inner.join("／"))
}

/// Step-1 handler
pub struct QualificationStep {
    matcher: Arc<TagMatcher>,
    store: Arc<dyn SessionStore>,
}

impl QualificationStep {
    pub fn new(matcher: Arc<TagMatcher>, store: Arc<dyn SessionStore>) -> Self {
        Self { matcher, store }
    }

    /// Pick the option a reply refers to
    ///
    /// Exact normalized match first; then a single option the reply names
    /// exactly by label or alias; then a single label found in the reply;
    /// then a single option among the labels found.
    fn resolve_choice(&self, options: &[String], reply: &str) -> Option<String> {
        debug!(?options, %reply, "resolve_choice: called");
        let key = normalize(reply);
        if let Some(option) = options.iter().find(|o| normalize(o) == key) {
            return Some(option.clone());
        }

        let exact = self.matcher.exact_labels(reply);
        let mut named = options.iter().filter(|o| exact.contains(o));
        if let (Some(option), None) = (named.next(), named.next()) {
            debug!(%option, "resolve_choice: exact alias of one option");
            return Some(option.clone());
        }

        let labels = self.matcher.match_license_labels(reply);
        if let [label] = labels.as_slice() {
            debug!(%label, "resolve_choice: single label in reply");
            return Some(label.clone());
        }

        let mut candidates = options.iter().filter(|o| labels.contains(o));
        match (candidates.next(), candidates.next()) {
            (Some(option), None) => Some(option.clone()),
            _ => None,
        }
    }

    /// Advance to step 2 with the resolved IDs
    fn resolved(&self, request: &TurnRequest, ids: BTreeSet<u32>) -> TurnResponse {
        info!(session_id = %request.session_id, ?ids, "Qualification resolved");
        let status = request.status.clone().merged(Status::with_qual_ids(ids));
        TurnResponse::new(status, Meta::start_of(FIRST_STEP + 1))
    }

    /// Stay at step 1 and ask for a choice
    fn ask_choice(&self, request: &TurnRequest, options: Vec<String>, retry: bool) -> TurnResponse {
        debug!(?options, %retry, "ask_choice: called");
        TurnResponse::new(request.status.clone(), Meta::step(FIRST_STEP))
            .with_response(format_choice_prompt(&options))
            .with_drill(Drill {
                awaiting_choice: true,
                options,
                retry,
            })
    }
}

#[async_trait]
impl StepHandler for QualificationStep {
    async fn handle(&self, request: &TurnRequest) -> Result<TurnResponse, InterviewError> {
        let session_id = request.session_id.as_str();
        let text = request.user_message.trim();
        debug!(%session_id, %text, "QualificationStep::handle: called");

        if text.is_empty() {
            self.store.delete_choices(session_id).await?;
            return Ok(TurnResponse::new(request.status.clone(), Meta::step(FIRST_STEP)).with_response(ASK_QUALIFICATION));
        }

        if let Some(pending) = self.store.get_choices(session_id).await? {
            return match self.resolve_choice(&pending.options, text) {
                Some(label) => {
                    self.store.delete_choices(session_id).await?;
                    Ok(self.resolved(request, self.matcher.ids_for_label(&label)))
                }
                None => Ok(self.ask_choice(request, pending.options, true)),
            };
        }

        if let [label] = self.matcher.exact_labels(text).as_slice() {
            debug!(%label, "QualificationStep::handle: exact label");
            return Ok(self.resolved(request, self.matcher.ids_for_label(label)));
        }

        let options = unique_options(&self.matcher.match_license_labels(text));
        match options.as_slice() {
            [] => {
                debug!("QualificationStep::handle: no label, extracting from raw text");
                Ok(self.resolved(request, self.matcher.extract_qualification_ids_from_text(text)))
            }
            [label] => Ok(self.resolved(request, self.matcher.ids_for_label(label))),
            _ => {
                let pending = PendingChoices::new(options);
                self.store.set_choices(session_id, pending.clone()).await?;
                Ok(self.ask_choice(request, pending.options, false))
            }
        }
    }
}
