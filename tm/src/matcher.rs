//! Qualification, license and tag matching
//!
//! All comparisons happen on [`normalize`]d forms. License matching is
//! substring based (alias inside the input); tag matching is deliberately
//! permissive and also accepts the input inside a tag name.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::normalize::{lookup_variants, normalize, to_fullwidth, to_halfwidth};
use crate::refdata::ReferenceData;

/// Phrases that imply a must-have condition, mapped to tag names
pub const MUST_HAVE_KEYWORDS: &[(&str, &str)] = &[
    ("ボーナス", "賞与あり"),
    ("賞与", "賞与あり"),
    ("残業なし", "残業なし"),
    ("残業ゼロ", "残業なし"),
    ("残業少", "残業少なめ"),
    ("定時", "残業少なめ"),
    ("夜勤なし", "夜勤なし"),
    ("日勤のみ", "夜勤なし"),
    ("土日休", "土日休み"),
    ("週休2日", "週休2日"),
    ("託児", "託児所あり"),
    ("寮", "寮あり"),
];

/// One license label and the canonical forms that select it
#[derive(Debug, Clone)]
struct LicenseIndex {
    label: String,
    keys: Vec<String>,
}

/// Lookup tables built once from [`ReferenceData`]
#[derive(Debug, Clone)]
pub struct TagMatcher {
    /// In registration order; drives the order of matched labels
    licenses: Vec<LicenseIndex>,
    /// Canonical alias -> labels, for exact hits
    alias_labels: HashMap<String, Vec<String>>,
    /// Canonical qualification name -> IDs
    qualifications: HashMap<String, BTreeSet<u32>>,
    /// Canonical tag name or alias -> IDs
    tag_index: HashMap<String, BTreeSet<u32>>,
    /// Canonical tag names, for containment tests
    tag_names: Vec<(String, u32)>,
}

fn push_unique(keys: &mut Vec<String>, key: String) {
    if !key.is_empty() && !keys.contains(&key) {
        keys.push(key);
    }
}

/// Canonical forms under which a reference name is indexed
fn index_keys(name: &str) -> Vec<String> {
    let mut keys = Vec::new();
    push_unique(&mut keys, normalize(name));
    push_unique(&mut keys, normalize(&to_halfwidth(name)));
    push_unique(&mut keys, normalize(&to_fullwidth(name)));
    keys
}

impl TagMatcher {
    /// Build the lookup tables
    pub fn new(data: &ReferenceData) -> Self {
        debug!(
            qualifications = data.qualifications.len(),
            licenses = data.licenses.len(),
            tags = data.tags.len(),
            "TagMatcher::new: called"
        );

        let mut licenses = Vec::with_capacity(data.licenses.len());
        let mut alias_labels: HashMap<String, Vec<String>> = HashMap::new();
        for entry in &data.licenses {
            let mut keys = Vec::new();
            for spelling in std::iter::once(&entry.label).chain(entry.aliases.iter()) {
                for key in index_keys(spelling) {
                    push_unique(&mut keys, key);
                }
            }
            for key in &keys {
                let labels = alias_labels.entry(key.clone()).or_default();
                if !labels.contains(&entry.label) {
                    labels.push(entry.label.clone());
                }
            }
            licenses.push(LicenseIndex {
                label: entry.label.clone(),
                keys,
            });
        }

        let mut qualifications: HashMap<String, BTreeSet<u32>> = HashMap::new();
        for q in &data.qualifications {
            for key in index_keys(&q.name) {
                qualifications.entry(key).or_default().insert(q.id);
            }
        }

        let mut tag_index: HashMap<String, BTreeSet<u32>> = HashMap::new();
        let mut tag_names = Vec::with_capacity(data.tags.len());
        for tag in &data.tags {
            for spelling in std::iter::once(&tag.name).chain(tag.aliases.iter()) {
                for key in index_keys(spelling) {
                    tag_index.entry(key).or_default().insert(tag.id);
                }
            }
            let name = normalize(&tag.name);
            if !name.is_empty() {
                tag_names.push((name, tag.id));
            }
        }

        Self {
            licenses,
            alias_labels,
            qualifications,
            tag_index,
            tag_names,
        }
    }

    /// Labels whose label or alias occurs inside the input
    ///
    /// Every hit counts, so an input containing an alias shared by several
    /// labels returns all of them. Order follows the license table.
    pub fn match_license_labels(&self, text: &str) -> Vec<String> {
        let input = normalize(text);
        debug!(%text, %input, "match_license_labels: called");
        if input.is_empty() {
            return Vec::new();
        }

        let labels: Vec<String> = self
            .licenses
            .iter()
            .filter(|entry| entry.keys.iter().any(|key| input.contains(key.as_str())))
            .map(|entry| entry.label.clone())
            .collect();
        debug!(?labels, "match_license_labels: matched");
        labels
    }

    /// Labels whose label or alias is exactly the input
    pub fn exact_labels(&self, text: &str) -> Vec<String> {
        debug!(%text, "exact_labels: called");
        let mut labels: Vec<String> = Vec::new();
        for key in lookup_variants(text) {
            if let Some(hits) = self.alias_labels.get(&key) {
                for label in hits {
                    if !labels.contains(label) {
                        labels.push(label.clone());
                    }
                }
            }
        }
        labels
    }

    /// Qualification IDs whose name is exactly one of the lookup variants
    pub fn ids_for_label(&self, label: &str) -> BTreeSet<u32> {
        let mut ids = BTreeSet::new();
        for key in lookup_variants(label) {
            if let Some(hits) = self.qualifications.get(&key) {
                ids.extend(hits.iter().copied());
            }
        }
        debug!(%label, ?ids, "ids_for_label: resolved");
        ids
    }

    /// Resolve free text to qualification IDs
    ///
    /// Goes through license labels first; only when none matches is the raw
    /// text looked up in the qualification table itself.
    pub fn extract_qualification_ids_from_text(&self, text: &str) -> BTreeSet<u32> {
        debug!(%text, "extract_qualification_ids_from_text: called");
        let labels = self.match_license_labels(text);
        if labels.is_empty() {
            debug!("extract_qualification_ids_from_text: no label, falling back to raw text");
            return self.ids_for_label(text);
        }
        labels.iter().flat_map(|label| self.ids_for_label(label)).collect()
    }

    /// Resolve free text to tag IDs
    ///
    /// Exact lookup over names and aliases, plus containment in both
    /// directions against every tag name. Short tag names over-match.
    pub fn match_tag_ids(&self, text: &str) -> BTreeSet<u32> {
        let input = normalize(text);
        debug!(%text, %input, "match_tag_ids: called");
        let mut ids = BTreeSet::new();
        if input.is_empty() {
            return ids;
        }

        for key in lookup_variants(text) {
            if let Some(hits) = self.tag_index.get(&key) {
                ids.extend(hits.iter().copied());
            }
        }
        for (name, id) in &self.tag_names {
            if input.contains(name.as_str()) || name.contains(input.as_str()) {
                ids.insert(*id);
            }
        }
        debug!(?ids, "match_tag_ids: matched");
        ids
    }

    /// Tag IDs for a must-have answer: [`Self::match_tag_ids`] plus keyword hits
    pub fn find_must_have_tag_ids(&self, text: &str) -> BTreeSet<u32> {
        debug!(%text, "find_must_have_tag_ids: called");
        let mut ids = self.match_tag_ids(text);
        let input = normalize(text);
        if input.is_empty() {
            return ids;
        }

        for (keyword, tag_name) in MUST_HAVE_KEYWORDS {
            if input.contains(normalize(keyword).as_str()) {
                for key in lookup_variants(tag_name) {
                    if let Some(hits) = self.tag_index.get(&key) {
                        debug!(%keyword, %tag_name, "find_must_have_tag_ids: keyword hit");
                        ids.extend(hits.iter().copied());
                    }
                }
            }
        }
        ids
    }
}
