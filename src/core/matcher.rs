use crate::core::{IndexEntry, Technique, TestList};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, Default)]
pub struct MatchOptions {
    /// Let a parent technique (`T1003`) also claim index entries for `T1003.xxx`.
    pub include_subtechniques: bool,
}

fn covers(chain_id: &str, entry_id: &str, options: MatchOptions) -> bool {
    if chain_id == entry_id {
        return true;
    }
    options.include_subtechniques
        && !chain_id.contains('.')
        && entry_id
            .strip_prefix(chain_id)
            .is_some_and(|rest| rest.starts_with('.'))
}

/// Walk the chain in order and collect every index entry for each technique.
///
/// Entries for the same technique keep their index order; a test already
/// emitted for an earlier technique is not repeated.
pub fn match_tests(chain: &[Technique], entries: &[IndexEntry], options: MatchOptions) -> TestList {
    let mut emitted = HashSet::new();
    let mut tests = Vec::new();

    for technique in chain {
        let before = tests.len();
        for entry in entries.iter().filter(|e| {
            e.techniques
                .iter()
                .any(|id| covers(&technique.id, id, options))
        }) {
            if emitted.insert(entry.test_id.as_str()) {
                tests.push(entry.test_id.clone());
            }
        }

        let matched = tests.len() - before;
        if matched == 0 {
            tracing::debug!("{} has no tests in the index", technique.id);
        } else {
            tracing::debug!("{} contributes {} tests", technique.id, matched);
        }
    }

    TestList { tests }
}
