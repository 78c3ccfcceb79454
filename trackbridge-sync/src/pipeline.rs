//! Shared sync pipeline entrypoint used by CLI and daemon.

use std::path::Path;

use trackbridge_clients::{JiraClient, LinearClient};
use trackbridge_core::{BridgeConfig, JiraApi, LinearApi};

use crate::engine::{self, RunSummary};
use crate::error::SyncError;

/// Run one reconciliation pass with HTTP clients built from `config`.
///
/// The project id is checked before credentials so the most common
/// misconfiguration is reported first.
pub fn run(home: &Path, config: &BridgeConfig) -> Result<RunSummary, SyncError> {
    config.sync_config()?;
    let jira = JiraClient::new(&config.jira.credentials()?);
    let linear = LinearClient::new(config.linear.api_url.clone(), config.linear.api_key()?);
    run_with(&jira, &linear, home, config)
}

/// Run one reconciliation pass against the given trackers.
///
/// The identity store is `config.store_path`, or the default under `home`.
pub fn run_with(
    jira: &dyn JiraApi,
    linear: &dyn LinearApi,
    home: &Path,
    config: &BridgeConfig,
) -> Result<RunSummary, SyncError> {
    let sync = config.sync_config()?;
    let store = config.identity_store_at(home);
    engine::run(jira, linear, &store, &sync)
}
