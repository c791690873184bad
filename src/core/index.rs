use crate::core::IndexEntry;
use crate::utils::error::{ChainError, Result};
use serde_yaml::{Mapping, Value};
use std::collections::HashSet;

fn parse_error(path: &str, message: impl Into<String>) -> ChainError {
    ChainError::IndexParseError {
        path: path.to_string(),
        message: message.into(),
    }
}

pub fn normalize_technique(id: &str) -> String {
    id.trim().to_uppercase()
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
}

/// Test ids end up one per line in the emitted list.
fn check_test_id(test_id: &str, path: &str) -> Result<()> {
    if test_id.is_empty() {
        return Err(parse_error(path, "test id must not be empty"));
    }
    if test_id.contains(['\n', '\r']) {
        return Err(parse_error(
            path,
            format!("test id {:?} must not contain a line break", test_id),
        ));
    }
    Ok(())
}

/// Entries of an index file plus every technique it declares, including
/// technique blocks that list no tests.
#[derive(Debug, Clone, Default)]
pub struct ParsedIndex {
    pub entries: Vec<IndexEntry>,
    pub techniques: Vec<String>,
}

/// Parse an index file into entries, in file order.
///
/// Each top-level entry is read either as an Atomic Red Team tactic block
/// (`tactic -> technique -> atomic_tests`) or as a flat `test -> technique(s)`
/// mapping. A test id seen twice keeps its first occurrence.
pub fn parse_index(content: &str, path: &str) -> Result<Vec<IndexEntry>> {
    parse_index_document(content, path).map(|index| index.entries)
}

pub fn parse_index_document(content: &str, path: &str) -> Result<ParsedIndex> {
    if content.trim().is_empty() {
        return Err(parse_error(path, "index file is empty"));
    }

    let document: Value = serde_yaml::from_str(content)
        .map_err(|e| parse_error(path, format!("YAML parse error: {}", e)))?;

    let top = match document {
        Value::Mapping(top) => top,
        Value::Null => return Err(parse_error(path, "index file is empty")),
        _ => return Err(parse_error(path, "top level must be a mapping")),
    };

    let mut index = ParsedIndex::default();
    let mut seen = HashSet::new();
    let mut declared = HashSet::new();
    let mut declare = |techniques: &mut Vec<String>, id: &str| {
        if declared.insert(id.to_string()) {
            techniques.push(id.to_string());
        }
    };

    for (key, value) in &top {
        let key = scalar_string(key)
            .ok_or_else(|| parse_error(path, "top-level keys must be strings"))?;

        match value {
            Value::String(_) | Value::Sequence(_) => {
                let techniques = flat_techniques(value).ok_or_else(|| {
                    parse_error(
                        path,
                        format!("test '{}' must map to a technique id or a list of them", key),
                    )
                })?;
                let test_id = key.trim();
                check_test_id(test_id, path)?;
                for id in &techniques {
                    declare(&mut index.techniques, id);
                }
                if seen.insert(test_id.to_string()) {
                    index.entries.push(IndexEntry::new(test_id, techniques));
                }
            }
            Value::Mapping(techniques) => {
                let (block_techniques, entries) = parse_tactic(&key, techniques, path)?;
                for id in &block_techniques {
                    declare(&mut index.techniques, id);
                }
                for entry in entries {
                    if seen.insert(entry.test_id.clone()) {
                        index.entries.push(entry);
                    }
                }
            }
            _ => {
                return Err(parse_error(
                    path,
                    format!("entry '{}' is neither a technique mapping nor a tactic block", key),
                ))
            }
        }
    }

    tracing::debug!(
        "Parsed {} index entries ({} techniques) from {}",
        index.entries.len(),
        index.techniques.len(),
        path
    );
    Ok(index)
}

fn flat_techniques(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(id) => Some(vec![normalize_technique(id)]),
        Value::Sequence(ids) => ids
            .iter()
            .map(|id| id.as_str().map(normalize_technique))
            .collect(),
        _ => None,
    }
}

fn parse_tactic(
    tactic: &str,
    techniques: &Mapping,
    path: &str,
) -> Result<(Vec<String>, Vec<IndexEntry>)> {
    let mut declared = Vec::new();
    let mut entries = Vec::new();

    for (technique_key, block) in techniques {
        let technique = scalar_string(technique_key)
            .map(|id| normalize_technique(&id))
            .ok_or_else(|| {
                parse_error(path, format!("technique keys under '{}' must be strings", tactic))
            })?;

        let atomic_tests = block
            .as_mapping()
            .and_then(|b| b.get("atomic_tests"))
            .and_then(Value::as_sequence)
            .ok_or_else(|| {
                parse_error(
                    path,
                    format!("{}/{} has no atomic_tests list", tactic, technique),
                )
            })?;
        check_test_id(&technique, path)?;
        declared.push(technique.clone());

        for (i, test) in atomic_tests.iter().enumerate() {
            let test = test.as_mapping().ok_or_else(|| {
                parse_error(
                    path,
                    format!("{}/{} test #{} is not a mapping", tactic, technique, i + 1),
                )
            })?;

            let name = non_empty_str(test.get("name"));
            if name.is_none() {
                tracing::warn!("{} test #{} has no name", technique, i + 1);
            }
            let command = non_empty_str(
                test.get("executor")
                    .and_then(Value::as_mapping)
                    .and_then(|e| e.get("command")),
            );

            entries.push(IndexEntry {
                test_id: format!("{}-{}", technique, i + 1),
                techniques: vec![technique.clone()],
                name,
                command,
            });
        }
    }

    Ok((declared, entries))
}
