//! Error types for trackbridge-sync.

use thiserror::Error;

use trackbridge_core::{ConfigError, StoreError, TrackerError};

/// All errors that can abort a reconciliation run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A remote call failed; runs are never retried.
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// The identity store could not be read or written.
    #[error("identity store error: {0}")]
    Store(#[from] StoreError),

    /// The run could not be configured.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
