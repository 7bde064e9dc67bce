//! TagMatch - canonicalize free text into stable reference IDs
//!
//! Folds width variants, case and punctuation out of user input and resolves
//! it against three read-only reference tables: qualifications, licenses (with
//! alias sets) and tags.
//!
//! # Architecture
//!
//! ```text
//! data/
//! ├── qualifications.json   # [{id, name}]
//! ├── licenses.json         # [{label, aliases[]}]
//! └── tags.json             # [{id, name, category?, aliases?}]
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tagmatch::{ReferenceData, TagMatcher};
//!
//! let data = ReferenceData::from_dir("data")?;
//! let matcher = TagMatcher::new(&data);
//! let ids = matcher.extract_qualification_ids_from_text("ナースです");
//! let tags = matcher.find_must_have_tag_ids("ボーナスが欲しい");
//! ```

mod matcher;
mod normalize;
mod refdata;

pub use matcher::{MUST_HAVE_KEYWORDS, TagMatcher};
pub use normalize::{normalize, to_fullwidth, to_halfwidth, unique_options};
pub use refdata::{LicenseEntry, Qualification, ReferenceData, TagItem};

/// File name of the qualification table inside a reference-data directory
pub const QUALIFICATIONS_FILE: &str = "qualifications.json";

/// File name of the license/alias table inside a reference-data directory
pub const LICENSES_FILE: &str = "licenses.json";

/// File name of the tag table inside a reference-data directory
pub const TAGS_FILE: &str = "tags.json";
