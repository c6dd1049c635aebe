//! Error types for tether-sync.

use std::path::PathBuf;

use thiserror::Error;

use tether_core::{ConfigError, RegistryError, SyncKey};

/// Typed outcome of a failed remote call.
///
/// These are per-item and recoverable: the applier reports them and moves on.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("{collection}/{key} not found on remote")]
    NotFound { collection: String, key: String },

    #[error("{collection}/{key} already exists on remote")]
    Conflict { collection: String, key: String },

    /// Any other failure. `status` is absent for transport errors.
    #[error("remote request failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Failure {
        status: Option<u16>,
        message: String,
    },

    /// The remote answered with a payload we cannot interpret.
    #[error("unexpected remote payload: {0}")]
    Decode(String),
}

/// Which side of a reconciliation an item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Local => write!(f, "local"),
            Side::Remote => write!(f, "remote"),
        }
    }
}

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Required settings missing or malformed.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Type registry invariant violated.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The caller selected a type nobody registered.
    #[error("unknown sync type(s): {}", .names.join(", "))]
    UnknownType { names: Vec<String> },

    /// Malformed local content for a strict type.
    #[error("invalid {}: {message}", .path.display())]
    Validation { path: PathBuf, message: String },

    /// Two items on one side share a synckey.
    #[error("duplicate {kind} key '{key}' in {side} items")]
    DuplicateKey {
        kind: String,
        key: SyncKey,
        side: Side,
    },

    /// A diff names a key neither side holds.
    #[error("{kind} key '{key}' is not among the reconciled items")]
    UnknownKey { kind: String, key: SyncKey },

    /// A remote call failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (cache, remote snapshot).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error (spec files).
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob in the scan config or match pattern does not parse.
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// An item is missing a field its type needs.
    #[error("{kind} item is missing field '{field}'")]
    MissingField { kind: String, field: &'static str },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Validation`].
pub(crate) fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> SyncError {
    SyncError::Validation {
        path: path.into(),
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_message_includes_status_when_known() {
        let with = RemoteError::Failure {
            status: Some(503),
            message: "unavailable".into(),
        };
        assert_eq!(
            with.to_string(),
            "remote request failed (HTTP 503): unavailable"
        );
        let without = RemoteError::Failure {
            status: None,
            message: "connection reset".into(),
        };
        assert_eq!(without.to_string(), "remote request failed: connection reset");
    }

    #[test]
    fn duplicate_key_names_side() {
        let err = SyncError::DuplicateKey {
            kind: "endpoints".into(),
            key: SyncKey::from("GET /a"),
            side: Side::Local,
        };
        assert_eq!(
            err.to_string(),
            "duplicate endpoints key 'GET /a' in local items"
        );
    }
}
