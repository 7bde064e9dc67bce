//! Reference tables
//!
//! Loaded once at startup and read-only afterwards. A missing or malformed file
//! is a startup failure, never a per-request one.

use std::fs;
use std::path::Path;

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{LICENSES_FILE, QUALIFICATIONS_FILE, TAGS_FILE};

/// A qualification with a stable numeric ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    pub id: u32,
    pub name: String,
}

/// A license label and the alternative spellings users type for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseEntry {
    /// Canonical label, also the name looked up in the qualification table
    pub label: String,
    /// Alternative spellings; an alias may be shared with other labels
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// A tag (job condition, preference) with a stable numeric ID
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagItem {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

/// All reference tables
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    pub qualifications: Vec<Qualification>,
    pub licenses: Vec<LicenseEntry>,
    pub tags: Vec<TagItem>,
}

impl ReferenceData {
    /// Load the three tables from a directory using the default file names
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        debug!(?dir, "ReferenceData::from_dir: called");
        Self::load(
            dir.join(QUALIFICATIONS_FILE),
            dir.join(LICENSES_FILE),
            dir.join(TAGS_FILE),
        )
    }

    /// Load the three tables from explicit paths
    pub fn load(
        qualifications: impl AsRef<Path>,
        licenses: impl AsRef<Path>,
        tags: impl AsRef<Path>,
    ) -> Result<Self> {
        let data = Self {
            qualifications: read_table(qualifications.as_ref())?,
            licenses: read_table(licenses.as_ref())?,
            tags: read_table(tags.as_ref())?,
        };
        data.validate()?;

        info!(
            qualifications = data.qualifications.len(),
            licenses = data.licenses.len(),
            tags = data.tags.len(),
            "Loaded reference data"
        );
        Ok(data)
    }

    /// Reject entries that can never match anything
    pub fn validate(&self) -> Result<()> {
        debug!("ReferenceData::validate: called");
        if let Some(q) = self.qualifications.iter().find(|q| q.name.trim().is_empty()) {
            return Err(eyre!("Qualification {} has an empty name", q.id));
        }
        if self.licenses.iter().any(|l| l.label.trim().is_empty()) {
            return Err(eyre!("License table contains an entry with an empty label"));
        }
        if let Some(t) = self.tags.iter().find(|t| t.name.trim().is_empty()) {
            return Err(eyre!("Tag {} has an empty name", t.id));
        }
        Ok(())
    }
}

fn read_table<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    debug!(?path, "read_table: called");
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read reference data {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse reference data {}", path.display()))
}
