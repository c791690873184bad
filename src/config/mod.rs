pub mod cli;
pub mod toml_config;

use crate::core::resolver::{DEFAULT_ATTACK_SOURCE, DEFAULT_TIMEOUT_SECS};
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_source, Validate,
};
use std::path::Path;
use std::time::Duration;
use toml_config::FileConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "attack-chain")]
#[command(about = "List the tests that exercise a threat group's ATT&CK technique chain, in chain order")]
pub struct CliConfig {
    /// Group name, alias or ATT&CK id (e.g. APT4, G0005)
    #[arg(short = 'g', long)]
    pub group: String,

    /// Index file mapping tests to techniques (Atomic Red Team index.yaml or test: technique map)
    #[arg(short = 'i', long)]
    pub index: String,

    /// Output test list [default: <output.directory>/<group>_tests.txt]
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Optional TOML settings file
    #[arg(short = 'c', long)]
    pub config: Option<String>,

    /// URL or path of the ATT&CK STIX bundle
    #[arg(long, env = "ATTACK_SOURCE")]
    pub attack_source: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Let a technique also match tests written for its sub-techniques
    #[arg(long)]
    pub include_subtechniques: bool,

    #[arg(short = 'v', long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Merge flags over the optional settings file and built-in defaults.
    pub fn resolve(&self) -> Result<RunConfig> {
        let file = match &self.config {
            Some(path) => {
                tracing::debug!("Loading settings from: {}", path);
                let file = FileConfig::from_file(path)?;
                file.validate()?;
                file
            }
            None => FileConfig::default(),
        };

        Ok(RunConfig::from_parts(
            self.group.clone(),
            self.index.clone(),
            self.output.clone(),
            self.attack_source.clone(),
            self.timeout_secs,
            self.include_subtechniques,
            &file,
        ))
    }
}

/// Settings for one run after flags, environment and settings file are merged.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub group: String,
    pub index_path: String,
    pub output_path: String,
    pub attack_source: String,
    pub timeout: Duration,
    pub include_subtechniques: bool,
}

impl RunConfig {
    pub fn from_parts(
        group: String,
        index_path: String,
        output: Option<String>,
        attack_source: Option<String>,
        timeout_secs: Option<u64>,
        include_subtechniques: bool,
        file: &FileConfig,
    ) -> Self {
        let output_path = output.unwrap_or_else(|| {
            let name = default_output_file(&group);
            match &file.output.directory {
                Some(directory) => Path::new(directory).join(name).to_string_lossy().into_owned(),
                None => name,
            }
        });

        Self {
            group: group.trim().to_string(),
            index_path,
            output_path,
            attack_source: attack_source
                .or_else(|| file.source.endpoint.clone())
                .unwrap_or_else(|| DEFAULT_ATTACK_SOURCE.to_string()),
            timeout: Duration::from_secs(
                timeout_secs
                    .or(file.source.timeout_seconds)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            include_subtechniques: include_subtechniques
                || file.matching.include_subtechniques.unwrap_or(false),
        }
    }
}

/// `<group>_tests.txt`, with anything but letters, digits, `-` and `_` replaced.
pub fn default_output_file(group: &str) -> String {
    let stem: String = group
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_tests.txt", stem)
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("group", &self.group)?;
        validate_path("index", &self.index_path)?;
        validate_path("output", &self.output_path)?;
        validate_source("attack_source", &self.attack_source)?;
        validate_positive_number("timeout_secs", self.timeout.as_secs(), 1)?;
        Ok(())
    }
}

impl ConfigProvider for RunConfig {
    fn group(&self) -> &str {
        &self.group
    }

    fn index_path(&self) -> &str {
        &self.index_path
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn include_subtechniques(&self) -> bool {
        self.include_subtechniques
    }
}
