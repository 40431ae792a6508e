use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while loading an edition. Per-page parsing never fails.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read edition file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse edition YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("no bundled edition for locale {0:?}")]
    UnknownEdition(String),

    #[error("unknown hooks {0:?}")]
    UnknownHooks(String),

    #[error("formula for {name:?}: {message}")]
    Formula { name: String, message: String },

    #[error("formula for {name:?}: unknown function {function:?}")]
    UnknownFunction { name: String, function: String },

    #[error("formula for {name:?}: {function} takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        function: &'static str,
        expected: String,
        got: usize,
    },

    #[error("invalid {field} pattern {pattern:?}: {source}")]
    Pattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
