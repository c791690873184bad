use crate::core::index::ParsedIndex;

/// Command prefixes are cut to this many characters.
pub const COMMAND_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogLine {
    pub test_id: String,
    pub pattern: String,
}

/// Test-number to command-prefix table, plus counts gathered while building it.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub lines: Vec<CatalogLine>,
    pub techniques: usize,
    pub tests: usize,
    pub manual_tests: usize,
}

fn command_prefix(command: &str) -> Option<String> {
    command
        .lines()
        .map(str::trim_end)
        .find(|line| !line.trim().is_empty())
        .map(|line| line.chars().take(COMMAND_PREFIX_CHARS).collect())
}

/// Test ids always go out double-quoted.
fn python_test_id(s: &str) -> String {
    if s.ends_with('\\') || s.contains('"') {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        format!("r\"{}\"", s)
    }
}

/// Quote `s` as a Python string literal, raw when that is lossless.
fn python_literal(s: &str) -> String {
    let raw_safe = !s.ends_with('\\');
    if raw_safe && !s.contains('\'') {
        format!("r'{}'", s)
    } else if raw_safe && !s.contains('"') {
        format!("r\"{}\"", s)
    } else {
        format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

/// Technique count covers every declared technique, tested or not.
pub fn build_catalog(index: &ParsedIndex) -> Catalog {
    let mut catalog = Catalog {
        techniques: index.techniques.len(),
        ..Catalog::default()
    };

    for entry in &index.entries {
        catalog.tests += 1;
        match &entry.name {
            Some(name) => tracing::debug!("{} name: {}", entry.test_id, name),
            None => tracing::debug!("{} has no name", entry.test_id),
        }

        match entry.command.as_deref().and_then(command_prefix) {
            Some(pattern) => {
                tracing::debug!("{}: {}", entry.test_id, pattern);
                catalog.lines.push(CatalogLine {
                    test_id: entry.test_id.clone(),
                    pattern,
                });
            }
            None => {
                tracing::warn!(
                    "{} has no command line; is this a manual test procedure?",
                    entry.test_id
                );
                catalog.manual_tests += 1;
            }
        }
    }

    catalog
}

impl Catalog {
    pub fn render(&self) -> String {
        let mut out = String::from("TECHNIQUES_TESTNUMBERS = [\n");
        for line in &self.lines {
            out.push_str(&format!(
                "    ({},{}),\n",
                python_test_id(&line.test_id),
                python_literal(&line.pattern)
            ));
        }
        out.push_str("]\n");
        out
    }
}
