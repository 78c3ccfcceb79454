//! One reconciliation pass over a Linear project.

use serde::{Deserialize, Serialize};

use trackbridge_core::{IdentityStore, IssueKey, JiraApi, LinearApi, LinearIssueId, SyncConfig};

use crate::comments::{mirror_jira_to_linear, mirror_linear_to_jira};
use crate::error::SyncError;
use crate::resolver::resolve;
use crate::status::{pull_linear_state, push_jira_status, StatusOutcome, TeamStateCache};

/// Counters reported by one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub scanned: usize,
    pub mapped: usize,
    pub status_changes: usize,
    pub comments_jira_to_linear: usize,
    pub comments_linear_to_jira: usize,
    pub skipped_no_jira_key: usize,
}

impl RunSummary {
    /// Total remote writes performed (or planned, under dry-run).
    pub fn total_changes(&self) -> usize {
        self.status_changes + self.comments_jira_to_linear + self.comments_linear_to_jira
    }
}

/// What happened to one linked issue.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IssueReport {
    push: Option<StatusOutcome>,
    pull: Option<StatusOutcome>,
    comments_jira_to_linear: usize,
    comments_linear_to_jira: usize,
}

/// Reconcile every issue in `config.project_id`.
///
/// Issues are processed one at a time; the first failing remote call or store
/// write aborts the run.
pub fn run(
    jira: &dyn JiraApi,
    linear: &dyn LinearApi,
    store: &IdentityStore,
    config: &SyncConfig,
) -> Result<RunSummary, SyncError> {
    let ids = linear.fetch_project_issue_ids(&config.project_id)?;
    tracing::info!(
        "reconciling {} Linear issue(s) in project {}{}",
        ids.len(),
        config.project_id,
        if config.dry_run { " [dry-run]" } else { "" }
    );

    let mut cache = TeamStateCache::new();
    let mut summary = RunSummary::default();
    for id in &ids {
        summary.scanned += 1;
        let resolution = resolve(jira, linear, store, id)?;
        let Some(key) = resolution.key() else {
            tracing::debug!("{id}: no Jira key found");
            summary.skipped_no_jira_key += 1;
            continue;
        };
        summary.mapped += 1;

        let report = reconcile_issue(jira, linear, store, config, &mut cache, key, id)?;
        summary.status_changes += [&report.push, &report.pull]
            .into_iter()
            .flatten()
            .filter(|outcome| outcome.is_change())
            .count();
        summary.comments_jira_to_linear += report.comments_jira_to_linear;
        summary.comments_linear_to_jira += report.comments_linear_to_jira;
    }

    tracing::info!(
        "run finished: scanned={} mapped={} statusChanges={} commentsJiraToLinear={} \
         commentsLinearToJira={} skippedNoJiraKey={}",
        summary.scanned,
        summary.mapped,
        summary.status_changes,
        summary.comments_jira_to_linear,
        summary.comments_linear_to_jira,
        summary.skipped_no_jira_key
    );
    Ok(summary)
}

fn reconcile_issue(
    jira: &dyn JiraApi,
    linear: &dyn LinearApi,
    store: &IdentityStore,
    config: &SyncConfig,
    cache: &mut TeamStateCache,
    key: &IssueKey,
    id: &LinearIssueId,
) -> Result<IssueReport, SyncError> {
    let push = if config.status_mode.pushes_to_linear() {
        Some(push_jira_status(jira, linear, config, cache, key, id)?)
    } else {
        None
    };
    let pull = if config.status_mode.pulls_from_linear() {
        Some(pull_linear_state(jira, linear, config, key, id)?)
    } else {
        None
    };
    let comments_jira_to_linear =
        mirror_jira_to_linear(jira, linear, store, key, id, config.dry_run)?;
    let comments_linear_to_jira =
        mirror_linear_to_jira(jira, linear, store, key, id, config.dry_run)?;

    Ok(IssueReport {
        push,
        pull,
        comments_jira_to_linear,
        comments_linear_to_jira,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_serializes_with_camel_case_keys() {
        let summary = RunSummary {
            scanned: 2,
            mapped: 1,
            status_changes: 1,
            comments_jira_to_linear: 0,
            comments_linear_to_jira: 0,
            skipped_no_jira_key: 1,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "scanned": 2,
                "mapped": 1,
                "statusChanges": 1,
                "commentsJiraToLinear": 0,
                "commentsLinearToJira": 0,
                "skippedNoJiraKey": 1,
            })
        );
        assert_eq!(summary.total_changes(), 1);
    }
}
