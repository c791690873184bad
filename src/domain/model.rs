use serde::{Deserialize, Serialize};

/// One step of a group's attack chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Technique {
    /// ATT&CK technique id, e.g. `T1003` or `T1003.001`.
    pub id: String,
    pub name: String,
    /// Earliest enterprise tactic the technique belongs to.
    pub tactic: Option<String>,
    /// 0-based position in the chain.
    pub position: usize,
}

/// A test declared by the index file and the techniques it exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub test_id: String,
    pub techniques: Vec<String>,
    pub name: Option<String>,
    pub command: Option<String>,
}

impl IndexEntry {
    pub fn new(test_id: impl Into<String>, techniques: Vec<String>) -> Self {
        Self {
            test_id: test_id.into(),
            techniques,
            name: None,
            command: None,
        }
    }
}

/// Everything the extract stage gathers for one run.
#[derive(Debug, Clone)]
pub struct ChainInput {
    pub group: String,
    pub chain: Vec<Technique>,
    pub index_path: String,
    pub index_content: String,
}

/// Ordered test identifiers, in attack-chain order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestList {
    pub tests: Vec<String>,
}

impl TestList {
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// One id per line, every line newline-terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for test in &self.tests {
            out.push_str(test);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_terminates_every_line() {
        let list = TestList {
            tests: vec!["testB".to_string(), "testC".to_string()],
        };
        assert_eq!(list.render(), "testB\ntestC\n");
    }

    #[test]
    fn test_render_empty_list() {
        assert_eq!(TestList::default().render(), "");
    }
}
