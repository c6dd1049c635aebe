//! Error types for tether-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building the type registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A type with this name is already registered.
    #[error("sync type '{name}' is already registered")]
    DuplicateType { name: String },

    /// The selector character is already claimed by another type.
    #[error("selector '-{selector}' is already used by sync type '{name}'")]
    DuplicateSelector { selector: char, name: String },
}

/// Configuration errors. Always fatal, raised before any scanning begins.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse project config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No `tether.yaml` at or above the starting directory.
    #[error("project config not found (looked for {path})")]
    NotFound { path: PathBuf },

    /// A required setting is absent.
    #[error("missing required setting '{field}'")]
    Missing { field: &'static str },

    /// A setting is present but unusable.
    #[error("invalid setting '{field}': {message}")]
    Invalid { field: &'static str, message: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
