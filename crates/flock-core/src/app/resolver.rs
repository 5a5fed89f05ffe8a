//! Identifier resolver: parsed entries -> lookup keys.

use std::collections::HashSet;

use crate::domain::{LookupKey, ParsedEntry};

/// Keys to look up, plus what was dropped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedKeys {
    /// Unique keys in first-appearance order.
    pub keys: Vec<LookupKey>,
    /// Entries whose key already appeared earlier in the request.
    pub repeated: usize,
    /// Entries with neither a numeric id nor a name.
    pub keyless: usize,
}

impl ResolvedKeys {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Numeric id wins over a name; blank names count as absent.
pub fn key_for(entry: &ParsedEntry) -> Option<LookupKey> {
    if let Some(id) = entry.numeric_id {
        return Some(LookupKey::Id(id));
    }
    entry
        .screen_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| LookupKey::Name(name.to_lowercase()))
}

/// Pure: no I/O, no errors. An empty result is a valid outcome.
pub fn resolve_keys(entries: &[ParsedEntry]) -> ResolvedKeys {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut resolved = ResolvedKeys::default();

    for entry in entries {
        match key_for(entry) {
            Some(key) if seen.insert(key.clone()) => resolved.keys.push(key),
            Some(_) => resolved.repeated += 1,
            None => resolved.keyless += 1,
        }
    }

    resolved
}
