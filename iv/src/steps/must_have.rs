//! Step 4: must-have tag extraction
//!
//! Tag IDs are always taken from the user's own words, never from the model.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tagmatch::TagMatcher;
use tracing::{debug, info};

use crate::domain::{Meta, Status};

use super::{InterviewError, StepHandler, TurnRequest, TurnResponse};

/// The must-have step number
pub const MUST_HAVE_STEP: u8 = 4;

/// Keyword-based must-have extraction
pub struct MustHaveStep {
    matcher: Arc<TagMatcher>,
}

impl MustHaveStep {
    pub fn new(matcher: Arc<TagMatcher>) -> Self {
        Self { matcher }
    }

    /// Sorted tag IDs mentioned in the text; empty is a valid answer
    pub fn extract(&self, text: &str) -> BTreeSet<u32> {
        debug!(%text, "MustHaveStep::extract: called");
        self.matcher.find_must_have_tag_ids(text)
    }

    /// Status patch carrying only `must_have_ids`
    pub fn patch(&self, text: &str) -> Status {
        Status::with_must_have_ids(self.extract(text))
    }
}

#[async_trait]
impl StepHandler for MustHaveStep {
    async fn handle(&self, request: &TurnRequest) -> Result<TurnResponse, InterviewError> {
        debug!(session_id = %request.session_id, "MustHaveStep::handle: called");
        let patch = self.patch(&request.user_message);
        info!(session_id = %request.session_id, ids = ?patch.must_have_ids, "Must-have tags extracted");
        let status = request.status.clone().merged(patch);
        Ok(TurnResponse::new(status, Meta::start_of(MUST_HAVE_STEP + 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Phase;
    use crate::steps::test_support::matcher;

    fn step() -> MustHaveStep {
        MustHaveStep::new(Arc::new(matcher()))
    }

    #[test]
    fn test_extract_sorted() {
        let ids: Vec<u32> = step().extract("定時で帰れて、ボーナスがあること").into_iter().collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_handle_advances_even_without_matches() {
        let request = TurnRequest::new("s1", Status::default(), Meta::at(4, Phase::Intro), "特にありません");
        let response = step().handle(&request).await.unwrap();

        assert_eq!(response.meta, Meta::at(5, Phase::Intro));
        assert_eq!(response.status.must_have_ids, Some(BTreeSet::new()));
        assert!(response.response.is_none());
    }

    #[tokio::test]
    async fn test_handle_merges_over_caller_status() {
        let status = Status {
            qual_ids: Some(BTreeSet::from([101])),
            must_have_ids: Some(BTreeSet::from([4])),
            ..Default::default()
        };
        let request = TurnRequest::new("s1", status, Meta::step(4), "夜勤なしが条件です");
        let response = step().handle(&request).await.unwrap();

        assert_eq!(response.status.qual_ids, Some(BTreeSet::from([101])));
        assert_eq!(response.status.must_have_ids, Some(BTreeSet::from([2])));
    }
}
