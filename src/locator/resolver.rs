//! Best-match resolution.
//!
//! A visible type signature always outranks a bare value binding; after
//! that the catalog order of the kinds decides, then position in the file.

use std::collections::BTreeMap;

use crate::types::{DefinitionKind, Match, MatchOrigin};

/// Pick the single best match among candidates for one identifier.
pub fn resolve(matches: &[Match]) -> Option<Match> {
    let has_signature = matches.iter().any(|m| m.kind.is_signature());

    matches
        .iter()
        .filter(|m| !(has_signature && m.kind == DefinitionKind::Assignment))
        .min_by_key(|m| (m.kind, m.line_index))
        .cloned()
}

/// Pick the best match independently for every file.
///
/// Results follow file enumeration order (path order, buffer first).
pub fn resolve_per_file(matches: &[Match]) -> Vec<Match> {
    let mut groups: BTreeMap<&MatchOrigin, Vec<Match>> = BTreeMap::new();
    for m in matches {
        groups.entry(&m.origin).or_default().push(m.clone());
    }

    groups
        .values()
        .filter_map(|group| resolve(group))
        .collect()
}
