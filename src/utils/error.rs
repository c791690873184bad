use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Unknown group '{group}': no matching intrusion set in the ATT&CK data")]
    UnknownGroup { group: String },

    #[error("ATT&CK data source unavailable ({source_location}): {message}")]
    SourceUnavailable {
        source_location: String,
        message: String,
    },

    #[error("ATT&CK request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("Malformed ATT&CK data ({source_location}): {message}")]
    AttackDataError {
        source_location: String,
        message: String,
    },

    #[error("Failed to parse index file '{path}': {message}")]
    IndexParseError { path: String, message: String },

    #[error("Failed to write output file '{path}': {source}")]
    OutputError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

/// Broad failure class, one per stage of the run plus configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lookup,
    Parse,
    Io,
    Config,
}

impl ChainError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownGroup { .. }
            | Self::SourceUnavailable { .. }
            | Self::ApiError(_)
            | Self::AttackDataError { .. } => ErrorCategory::Lookup,
            Self::IndexParseError { .. } => ErrorCategory::Parse,
            Self::OutputError { .. } | Self::IoError(_) => ErrorCategory::Io,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Config,
        }
    }

    /// Process exit code for this failure.
    ///
    /// | Code | Meaning             |
    /// |------|---------------------|
    /// | 1    | Configuration error |
    /// | 2    | Lookup error        |
    /// | 3    | Index parse error   |
    /// | 4    | I/O error           |
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Config => 1,
            ErrorCategory::Lookup => 2,
            ErrorCategory::Parse => 3,
            ErrorCategory::Io => 4,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::UnknownGroup { group } => {
                format!("Group '{}' was not found in the ATT&CK knowledge base", group)
            }
            Self::SourceUnavailable {
                source_location, ..
            } => format!("Could not reach the ATT&CK data at {}", source_location),
            Self::ApiError(e) => format!("Request to the ATT&CK data source failed: {}", e),
            Self::AttackDataError {
                source_location, ..
            } => format!("The ATT&CK data at {} could not be read", source_location),
            Self::IndexParseError { path, message } => {
                format!("Index file '{}' is malformed: {}", path, message)
            }
            Self::OutputError { path, source } => {
                format!("Could not write the test list to '{}': {}", path, source)
            }
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::UnknownGroup { .. } => {
                "Check the group name; ATT&CK names, aliases and ids such as G0005 are accepted"
            }
            Self::SourceUnavailable { .. } | Self::ApiError(_) => {
                "Check network access or point --attack-source at a local enterprise-attack.json"
            }
            Self::AttackDataError { .. } => {
                "Make sure --attack-source is a STIX 2.x ATT&CK bundle"
            }
            Self::IndexParseError { .. } => {
                "Make sure the index is an Atomic Red Team index.yaml or a test-to-technique mapping"
            }
            Self::OutputError { .. } | Self::IoError(_) => {
                "Check that the output location exists and is writable"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. } => "Run with --help to review the accepted options",
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;
