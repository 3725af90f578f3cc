//! [`Query`] and [`SearchHit`], per spec.md §3.

use std::path::PathBuf;
use std::time::SystemTime;

use unicode_normalization::UnicodeNormalization;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeAttribute {
    Access,
    Modification,
    Creation,
}

#[derive(Clone, Debug, Default)]
pub struct Query {
    pub text: Vec<String>,
    pub root: Option<PathBuf>,
    pub mime_types: Option<Vec<String>>,
    pub date_range: Option<(SystemTime, SystemTime)>,
    pub recursive: bool,
    pub remote_recursive: bool,
    pub show_hidden: bool,
    pub time_attribute: Option<TimeAttribute>,
}

impl Query {
    /// Tokenises free text to lowercased, NFD-normalized whitespace-split
    /// substrings, per §3's `Query.text` definition.
    pub fn new(text: &str) -> Self {
        let tokens = text
            .split_whitespace()
            .map(|t| t.to_lowercase().nfd().collect::<String>())
            .collect();
        Query { text: tokens, recursive: false, remote_recursive: false, show_hidden: false, ..Default::default() }
    }

    pub fn with_root(mut self, root: PathBuf) -> Self {
        self.root = Some(root);
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn matches_text(&self, display_name: &str) -> bool {
        if self.text.is_empty() {
            return true;
        }
        let haystack = display_name.to_lowercase().nfd().collect::<String>();
        self.text.iter().all(|token| haystack.contains(token.as_str()))
    }

    /// §3's optional mime-type set: no restriction when unset, exact match
    /// against one of the set's entries otherwise.
    pub fn matches_mime(&self, content_type: &str) -> bool {
        match &self.mime_types {
            None => true,
            Some(types) => types.iter().any(|m| m == content_type),
        }
    }

    /// §3's optional date range, bound to whichever of access/modification/
    /// creation `time_attribute` selects (modification when unset). A
    /// candidate whose selected timestamp is unknown to the caller never
    /// matches a bounded range.
    pub fn matches_date(&self, modified: Option<SystemTime>, accessed: Option<SystemTime>, created: Option<SystemTime>) -> bool {
        let Some((start, end)) = self.date_range else { return true };
        let selected = match self.time_attribute.unwrap_or(TimeAttribute::Modification) {
            TimeAttribute::Access => accessed,
            TimeAttribute::Modification => modified,
            TimeAttribute::Creation => created,
        };
        matches!(selected, Some(t) if t >= start && t <= end)
    }
}

/// A single search result, per §3. `fts_rank` is higher-is-better; the
/// engine does not compare ranks across providers (§4.I).
#[derive(Clone, Debug)]
pub struct SearchHit {
    pub uri: String,
    pub fts_rank: f64,
    pub snippet: Option<String>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub created: Option<SystemTime>,
}
