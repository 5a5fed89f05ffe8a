//! Candidates - parsed entries, lookup keys and their resolution.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::CommunityId;

/// One entry produced by the file-ingestion collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEntry {
    pub numeric_id: Option<CommunityId>,
    pub screen_name: Option<String>,
    pub display_name: Option<String>,
}

impl ParsedEntry {
    pub fn with_id(id: CommunityId) -> Self {
        Self {
            numeric_id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            screen_name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Output of the file-ingestion collaborator: entries plus per-line errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedFile {
    pub entries: Vec<ParsedEntry>,
    pub errors: Vec<String>,
}

impl ParsedFile {
    /// Every line the caller submitted, including the ones that failed to parse.
    pub fn total_candidates(&self) -> usize {
        self.entries.len() + self.errors.len()
    }
}

/// Key sent to the directory API.
///
/// A numeric id wins over a name when an entry carries both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKey {
    Id(CommunityId),
    Name(String),
}

impl LookupKey {
    /// Whether a directory record answers this key.
    ///
    /// Names match case-insensitively; the directory normalises screen names.
    pub fn matches(&self, community: &Community) -> bool {
        match self {
            LookupKey::Id(id) => *id == community.id,
            LookupKey::Name(name) => community.screen_name.eq_ignore_ascii_case(name),
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::Id(id) => write!(f, "{id}"),
            LookupKey::Name(name) => f.write_str(name),
        }
    }
}

/// A community record returned by the directory API (the enriched fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Community {
    /// Canonical id; dedup is keyed on this, never on the lookup key.
    pub id: CommunityId,
    pub screen_name: String,
    pub name: String,
    #[serde(default)]
    pub members_count: Option<u64>,
    #[serde(default)]
    pub is_closed: bool,
}

/// Resolution of one lookup key.
///
/// Unresolved -> Matched | NotFound (validation), then Matched -> Duplicate
/// (dedup) when the canonical id repeats or is already stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    Matched(Community),
    NotFound,
    Duplicate(CommunityId),
}

/// One lookup key plus its outcome. Transient: never persisted itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub key: LookupKey,
    pub resolution: Resolution,
}

impl CandidateRecord {
    pub fn new(key: LookupKey) -> Self {
        Self {
            key,
            resolution: Resolution::Unresolved,
        }
    }

    pub fn matched(&self) -> Option<&Community> {
        match &self.resolution {
            Resolution::Matched(community) => Some(community),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.resolution, Resolution::NotFound)
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self.resolution, Resolution::Duplicate(_))
    }

    /// Only a matched record can become a duplicate of its own canonical id.
    pub fn mark_duplicate(&mut self) {
        if let Resolution::Matched(community) = &self.resolution {
            self.resolution = Resolution::Duplicate(community.id);
        }
    }
}
