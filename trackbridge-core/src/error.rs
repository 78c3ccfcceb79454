//! Error types for trackbridge-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Tracker;

/// Failures reported by a tracker client.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The tracker answered with a non-success HTTP status.
    #[error("{tracker} API HTTP {status}: {body}")]
    Http {
        tracker: Tracker,
        status: u16,
        body: String,
    },

    /// The request never produced an HTTP response (DNS, TLS, connection reset).
    #[error("{tracker} transport error: {message}")]
    Transport { tracker: Tracker, message: String },

    /// The response body did not have the expected shape.
    #[error("{tracker} response could not be decoded: {message}")]
    Decode { tracker: Tracker, message: String },

    /// The tracker accepted the request but refused the operation.
    #[error("{tracker} rejected {operation}: {message}")]
    Rejected {
        tracker: Tracker,
        operation: &'static str,
        message: String,
    },

    /// The referenced entity does not exist.
    #[error("{tracker} {entity} not found: {id}")]
    NotFound {
        tracker: Tracker,
        entity: &'static str,
        id: String,
    },
}

impl TrackerError {
    /// `true` when the error only says "this identifier does not resolve".
    ///
    /// Key validation discards candidates on these errors and keeps scanning;
    /// everything else (auth, 5xx, transport) aborts the run.
    pub fn is_unresolvable(&self) -> bool {
        match self {
            TrackerError::NotFound { .. } => true,
            TrackerError::Http { status, .. } => matches!(status, 400 | 404),
            _ => false,
        }
    }
}

/// Errors from the identity store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("identity store JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not lock identity store {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML, with path and serde_yaml's line context.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("missing required setting {field}; set {hint}")]
    Missing {
        field: &'static str,
        hint: &'static str,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

pub(crate) fn store_io(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
