//! Collected profile fields

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sparse profile state
///
/// Absent fields have not been collected yet. ID sets are ordered, so they
/// always serialize sorted and duplicate-free.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qual_ids: Option<BTreeSet<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub will_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_have_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub must_have_ids: Option<BTreeSet<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doing_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub being_text: Option<String>,
}

/// Free-text summary fields produced by generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Can,
    Will,
    MustHave,
    SelfText,
    Doing,
    Being,
}

impl TextField {
    /// JSON key of the field
    pub fn key(&self) -> &'static str {
        match self {
            Self::Can => "can_text",
            Self::Will => "will_text",
            Self::MustHave => "must_have_text",
            Self::SelfText => "self_text",
            Self::Doing => "doing_text",
            Self::Being => "being_text",
        }
    }
}

impl std::fmt::Display for TextField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl Status {
    /// Overwrite fields that are present in `patch`; leave the rest alone
    pub fn merge(&mut self, patch: Status) {
        debug!(?patch, "Status::merge: called");
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.qual_ids, patch.qual_ids);
        take(&mut self.can_text, patch.can_text);
        take(&mut self.will_text, patch.will_text);
        take(&mut self.must_have_text, patch.must_have_text);
        take(&mut self.must_have_ids, patch.must_have_ids);
        take(&mut self.self_text, patch.self_text);
        take(&mut self.doing_text, patch.doing_text);
        take(&mut self.being_text, patch.being_text);
    }

    /// Consuming form of [`Status::merge`]
    pub fn merged(mut self, patch: Status) -> Self {
        self.merge(patch);
        self
    }

    /// Read a text field
    pub fn text(&self, field: TextField) -> Option<&str> {
        match field {
            TextField::Can => self.can_text.as_deref(),
            TextField::Will => self.will_text.as_deref(),
            TextField::MustHave => self.must_have_text.as_deref(),
            TextField::SelfText => self.self_text.as_deref(),
            TextField::Doing => self.doing_text.as_deref(),
            TextField::Being => self.being_text.as_deref(),
        }
    }

    /// Set a text field
    pub fn set_text(&mut self, field: TextField, value: String) {
        let slot = match field {
            TextField::Can => &mut self.can_text,
            TextField::Will => &mut self.will_text,
            TextField::MustHave => &mut self.must_have_text,
            TextField::SelfText => &mut self.self_text,
            TextField::Doing => &mut self.doing_text,
            TextField::Being => &mut self.being_text,
        };
        *slot = Some(value);
    }

    /// Patch carrying only qualification IDs
    pub fn with_qual_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            qual_ids: Some(ids.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Patch carrying only must-have tag IDs
    pub fn with_must_have_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            must_have_ids: Some(ids.into_iter().collect()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_new_value_wins_when_present() {
        let mut status = Status {
            can_text: Some("old".to_string()),
            will_text: Some("keep".to_string()),
            ..Default::default()
        };
        status.merge(Status {
            can_text: Some("new".to_string()),
            ..Default::default()
        });

        assert_eq!(status.can_text.as_deref(), Some("new"));
        assert_eq!(status.will_text.as_deref(), Some("keep"));
    }

    #[test]
    fn test_merge_empty_string_is_a_value() {
        let status = Status {
            self_text: Some("something".to_string()),
            ..Default::default()
        }
        .merged(Status {
            self_text: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(status.self_text.as_deref(), Some(""));
    }

    #[test]
    fn test_ids_deserialize_sorted_unique() {
        let status: Status = serde_json::from_str(r#"{"qual_ids": [5, 1, 5, 3]}"#).unwrap();
        assert_eq!(serde_json::to_string(&status).unwrap(), r#"{"qual_ids":[1,3,5]}"#);
    }

    #[test]
    fn test_text_accessors() {
        let mut status = Status::default();
        status.set_text(TextField::Doing, "doing".to_string());
        assert_eq!(status.text(TextField::Doing), Some("doing"));
        assert_eq!(status.text(TextField::Being), None);
        assert_eq!(TextField::MustHave.key(), "must_have_text");
    }
}
