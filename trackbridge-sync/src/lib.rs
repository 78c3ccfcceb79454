//! # trackbridge-sync
//!
//! The Jira ↔ Linear reconciliation engine.
//!
//! Call [`engine::run`] with tracker implementations, an identity store and a
//! [`SyncConfig`](trackbridge_core::SyncConfig), or [`pipeline::run`] to build
//! the HTTP clients and store from a
//! [`BridgeConfig`](trackbridge_core::BridgeConfig).

pub mod comments;
pub mod engine;
pub mod error;
mod fetch;
pub mod keys;
pub mod marker;
pub mod pipeline;
pub mod resolver;
pub mod status;

pub use engine::{run, RunSummary};
pub use error::SyncError;
pub use resolver::{Resolution, Strategy};
pub use status::StatusOutcome;
