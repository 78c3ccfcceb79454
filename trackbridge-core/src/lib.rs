//! trackbridge core library — tracker data types, the identity store,
//! configuration, errors, and the capability traits the engine runs against.
//!
//! - [`types`] — newtypes and tracker records
//! - [`tracker`] — [`JiraApi`] / [`LinearApi`]
//! - [`identity`] — persisted issue and comment links
//! - [`config`] — file + environment configuration
//! - [`adf`] — plain text <-> Atlassian Document Format

pub mod adf;
pub mod config;
pub mod error;
pub mod identity;
pub mod tracker;
pub mod types;

#[cfg(any(test, feature = "fakes"))]
pub mod fakes;

pub use config::{BridgeConfig, StatusMode, SyncConfig};
pub use error::{ConfigError, StoreError, TrackerError};
pub use identity::{IdentityFile, IdentityStore};
pub use tracker::{JiraApi, LinearApi};
pub use types::{
    IssueKey, JiraComment, JiraCommentId, JiraIssue, JiraStatus, JiraTransition, LinearComment,
    LinearCommentId, LinearIssueId, LinearIssueView, StatusCategory, TeamStates, Tracker,
};
