//! Workflow-state reconciliation between a linked Jira / Linear pair.
//!
//! Jira → Linear maps the Jira status (exact-name override first, then the
//! status category) to a Linear state name and resolves it to a state id in
//! the issue's team. Linear → Jira maps the Linear state name to a Jira
//! status and applies the transition that leads there.

use std::collections::HashMap;

use trackbridge_core::{
    IssueKey, JiraApi, JiraStatus, JiraTransition, LinearApi, LinearIssueId, StatusCategory,
    SyncConfig, TeamStates, TrackerError,
};

use crate::fetch;

/// Outcome of one reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// No mapping covers the current source state.
    NotConfigured,
    /// The target already has the desired state.
    Unchanged { state: String },
    /// The target was moved.
    Changed { from: String, to: String },
    /// Dry-run: the target would have been moved.
    WouldChange { from: String, to: String },
    /// The desired state exists in the mapping but not on the target
    /// (no such team state, or no transition leading to it).
    Unavailable { target: String },
}

impl StatusOutcome {
    /// Whether this outcome counts toward `statusChanges`.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            StatusOutcome::Changed { .. } | StatusOutcome::WouldChange { .. }
        )
    }
}

/// Per-run cache of team workflow states (`team id → state name → state id`).
#[derive(Debug, Default)]
pub struct TeamStateCache {
    teams: HashMap<String, TeamStates>,
}

impl TeamStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// State id for `name` in `team_id`, fetching the team's states once.
    pub fn state_id(
        &mut self,
        linear: &dyn LinearApi,
        team_id: &str,
        name: &str,
    ) -> Result<Option<String>, TrackerError> {
        if !self.teams.contains_key(team_id) {
            let states = linear.fetch_team_states_by_name(team_id)?;
            self.teams.insert(team_id.to_string(), states);
        }
        Ok(self
            .teams
            .get(team_id)
            .and_then(|states| states.get(name))
            .cloned())
    }
}

/// Linear state name a Jira status should map to.
///
/// A status without a known category is treated as `indeterminate`.
pub fn desired_linear_state<'c>(config: &'c SyncConfig, status: &JiraStatus) -> Option<&'c str> {
    if let Some(name) = config.linear_state_for_jira_status.get(&status.name) {
        return Some(name.as_str());
    }
    let category = status.category.unwrap_or(StatusCategory::Indeterminate);
    config.linear_state_for_jira_category.get(category)
}

/// Transition leading to `status`: matched on the target status name first,
/// then on the transition's own name.
pub fn pick_transition<'t>(
    transitions: &'t [JiraTransition],
    status: &str,
) -> Option<&'t JiraTransition> {
    transitions
        .iter()
        .find(|t| t.target_status.as_deref() == Some(status))
        .or_else(|| transitions.iter().find(|t| t.name == status))
}

/// Move the Linear issue to the state its Jira issue implies.
pub fn push_jira_status(
    jira: &dyn JiraApi,
    linear: &dyn LinearApi,
    config: &SyncConfig,
    cache: &mut TeamStateCache,
    key: &IssueKey,
    id: &LinearIssueId,
) -> Result<StatusOutcome, TrackerError> {
    let (jira_issue, issue) = fetch::both(
        || jira.get_issue(key),
        || linear.fetch_issue_sync_view(id),
    );
    let (jira_issue, issue) = (jira_issue?, issue?);

    let Some(desired) = desired_linear_state(config, &jira_issue.status) else {
        tracing::debug!("{key} → {id}: no Linear state for '{}'", jira_issue.status.name);
        return Ok(StatusOutcome::NotConfigured);
    };
    if issue.state_name == desired {
        return Ok(StatusOutcome::Unchanged {
            state: desired.to_string(),
        });
    }

    let Some(state_id) = cache.state_id(linear, &issue.team_id, desired)? else {
        tracing::debug!("{key} → {id}: team {} has no state '{desired}'", issue.team_id);
        return Ok(StatusOutcome::Unavailable {
            target: desired.to_string(),
        });
    };

    let from = issue.state_name;
    let to = desired.to_string();
    if config.dry_run {
        tracing::info!("[dry-run] would move {id} from '{from}' to '{to}' (Jira {key})");
        return Ok(StatusOutcome::WouldChange { from, to });
    }
    linear.update_issue_state(id, &state_id)?;
    tracing::info!("moved {id} from '{from}' to '{to}' (Jira {key})");
    Ok(StatusOutcome::Changed { from, to })
}

/// Transition the Jira issue to the status its Linear issue implies.
pub fn pull_linear_state(
    jira: &dyn JiraApi,
    linear: &dyn LinearApi,
    config: &SyncConfig,
    key: &IssueKey,
    id: &LinearIssueId,
) -> Result<StatusOutcome, TrackerError> {
    let (jira_issue, issue) = fetch::both(
        || jira.get_issue(key),
        || linear.fetch_issue_sync_view(id),
    );
    let (jira_issue, issue) = (jira_issue?, issue?);

    let Some(desired) = config.jira_status_for_linear_state.get(&issue.state_name) else {
        tracing::debug!("{id} → {key}: no Jira status for '{}'", issue.state_name);
        return Ok(StatusOutcome::NotConfigured);
    };
    if jira_issue.status.name == *desired {
        return Ok(StatusOutcome::Unchanged {
            state: desired.clone(),
        });
    }

    let transitions = jira.list_transitions(key)?;
    let Some(transition) = pick_transition(&transitions, desired) else {
        tracing::debug!("{id} → {key}: no transition to '{desired}'");
        return Ok(StatusOutcome::Unavailable {
            target: desired.clone(),
        });
    };

    let from = jira_issue.status.name;
    let to = desired.clone();
    if config.dry_run {
        tracing::info!("[dry-run] would transition {key} from '{from}' to '{to}' (Linear {id})");
        return Ok(StatusOutcome::WouldChange { from, to });
    }
    jira.apply_transition(key, &transition.id)?;
    tracing::info!("transitioned {key} from '{from}' to '{to}' (Linear {id})");
    Ok(StatusOutcome::Changed { from, to })
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackbridge_core::fakes::{FakeIssue, FakeJira, FakeLinear, JiraWrite, LinearWrite};

    fn config() -> SyncConfig {
        SyncConfig::for_project("proj")
    }

    fn status(name: &str, category: Option<StatusCategory>) -> JiraStatus {
        JiraStatus {
            name: name.to_string(),
            category,
        }
    }

    fn transition(id: &str, name: &str, target: Option<&str>) -> JiraTransition {
        JiraTransition {
            id: id.to_string(),
            name: name.to_string(),
            target_status: target.map(str::to_string),
        }
    }

    fn pair() -> (IssueKey, LinearIssueId) {
        (IssueKey::from("ABC-1"), LinearIssueId::from("lin-1"))
    }

    #[test]
    fn status_override_beats_category() {
        let mut cfg = config();
        cfg.linear_state_for_jira_status
            .insert("In Review".into(), "Review".into());
        let st = status("In Review", Some(StatusCategory::Indeterminate));
        assert_eq!(desired_linear_state(&cfg, &st), Some("Review"));
    }

    #[test]
    fn missing_category_counts_as_indeterminate() {
        assert_eq!(
            desired_linear_state(&config(), &status("Odd", None)),
            Some("In Progress")
        );
    }

    #[test]
    fn cleared_category_entry_means_not_configured() {
        let mut cfg = config();
        cfg.linear_state_for_jira_category.done = None;
        assert_eq!(
            desired_linear_state(&cfg, &status("Done", Some(StatusCategory::Done))),
            None
        );
    }

    #[test]
    fn transition_target_name_wins_over_transition_name() {
        let transitions = vec![
            transition("1", "Done", Some("Closed")),
            transition("2", "Finish", Some("Done")),
        ];
        assert_eq!(pick_transition(&transitions, "Done").map(|t| t.id.as_str()), Some("2"));
        assert_eq!(pick_transition(&transitions, "Closed").map(|t| t.id.as_str()), Some("1"));

        let by_name = vec![transition("7", "Done", None)];
        assert_eq!(pick_transition(&by_name, "Done").map(|t| t.id.as_str()), Some("7"));
        assert!(pick_transition(&by_name, "Closed").is_none());
    }

    #[test]
    fn push_moves_linear_to_category_state() {
        let jira = FakeJira::new().with_issue("ABC-1", "Done", StatusCategory::Done);
        let linear = FakeLinear::new()
            .with_issue("proj", FakeIssue::new("lin-1", "t", "Todo"))
            .with_team_states("team-1", &[("Todo", "s-todo"), ("Done", "s-done")]);
        let (key, id) = pair();

        let outcome =
            push_jira_status(&jira, &linear, &config(), &mut TeamStateCache::new(), &key, &id)
                .unwrap();
        assert_eq!(
            outcome,
            StatusOutcome::Changed { from: "Todo".into(), to: "Done".into() }
        );
        assert_eq!(
            linear.writes(),
            [LinearWrite::StateUpdate { issue: id, state_id: "s-done".into() }]
        );
        assert_eq!(linear.state_of("lin-1").as_deref(), Some("Done"));
    }

    #[test]
    fn push_is_idempotent_once_states_agree() {
        let jira = FakeJira::new().with_issue("ABC-1", "Done", StatusCategory::Done);
        let linear = FakeLinear::new()
            .with_issue("proj", FakeIssue::new("lin-1", "t", "Done"))
            .with_team_states("team-1", &[("Done", "s-done")]);
        let (key, id) = pair();

        let outcome =
            push_jira_status(&jira, &linear, &config(), &mut TeamStateCache::new(), &key, &id)
                .unwrap();
        assert_eq!(outcome, StatusOutcome::Unchanged { state: "Done".into() });
        assert!(!outcome.is_change());
        assert_eq!(linear.team_state_fetches(), 0);
        assert!(linear.writes().is_empty());
    }

    #[test]
    fn push_without_matching_team_state_is_unavailable() {
        let jira = FakeJira::new().with_issue("ABC-1", "Done", StatusCategory::Done);
        let linear = FakeLinear::new()
            .with_issue("proj", FakeIssue::new("lin-1", "t", "Todo"))
            .with_team_states("team-1", &[("Todo", "s-todo"), ("Shipped", "s-shipped")]);
        let (key, id) = pair();

        let outcome =
            push_jira_status(&jira, &linear, &config(), &mut TeamStateCache::new(), &key, &id)
                .unwrap();
        assert_eq!(outcome, StatusOutcome::Unavailable { target: "Done".into() });
        assert!(linear.writes().is_empty());
    }

    #[test]
    fn push_dry_run_reports_without_writing() {
        let jira = FakeJira::new().with_issue("ABC-1", "In Progress", StatusCategory::Indeterminate);
        let linear = FakeLinear::new()
            .with_issue("proj", FakeIssue::new("lin-1", "t", "Todo"))
            .with_team_states("team-1", &[("Todo", "s-todo"), ("In Progress", "s-wip")]);
        let mut cfg = config();
        cfg.dry_run = true;
        let (key, id) = pair();

        let outcome =
            push_jira_status(&jira, &linear, &cfg, &mut TeamStateCache::new(), &key, &id).unwrap();
        assert!(outcome.is_change());
        assert!(matches!(outcome, StatusOutcome::WouldChange { .. }));
        assert!(linear.writes().is_empty());
        assert_eq!(linear.state_of("lin-1").as_deref(), Some("Todo"));
    }

    #[test]
    fn team_states_are_fetched_once_per_cache() {
        let linear = FakeLinear::new().with_team_states("team-1", &[("Done", "s-done")]);
        let mut cache = TeamStateCache::new();
        assert_eq!(
            cache.state_id(&linear, "team-1", "Done").unwrap().as_deref(),
            Some("s-done")
        );
        assert_eq!(cache.state_id(&linear, "team-1", "Todo").unwrap(), None);
        assert_eq!(linear.team_state_fetches(), 1);
    }

    #[test]
    fn pull_applies_matching_transition() {
        let jira = FakeJira::new()
            .with_issue("ABC-1", "In Progress", StatusCategory::Indeterminate)
            .with_transition("ABC-1", "31", "Finish", Some(("Done", StatusCategory::Done)));
        let linear = FakeLinear::new().with_issue("proj", FakeIssue::new("lin-1", "t", "Done"));
        let mut cfg = config();
        cfg.jira_status_for_linear_state
            .insert("Done".into(), "Done".into());
        let (key, id) = pair();

        let outcome = pull_linear_state(&jira, &linear, &cfg, &key, &id).unwrap();
        assert_eq!(
            outcome,
            StatusOutcome::Changed { from: "In Progress".into(), to: "Done".into() }
        );
        assert_eq!(
            jira.writes(),
            [JiraWrite::Transition { key, transition_id: "31".into() }]
        );
        assert_eq!(jira.status_of("ABC-1").as_deref(), Some("Done"));
    }

    #[test]
    fn pull_without_mapping_or_transition_is_a_no_op() {
        let jira = FakeJira::new().with_issue("ABC-1", "To Do", StatusCategory::New);
        let linear =
            FakeLinear::new().with_issue("proj", FakeIssue::new("lin-1", "t", "Canceled"));
        let (key, id) = pair();

        let outcome = pull_linear_state(&jira, &linear, &config(), &key, &id).unwrap();
        assert_eq!(outcome, StatusOutcome::NotConfigured);

        let mut cfg = config();
        cfg.jira_status_for_linear_state
            .insert("Canceled".into(), "Won't Do".into());
        let outcome = pull_linear_state(&jira, &linear, &cfg, &key, &id).unwrap();
        assert_eq!(outcome, StatusOutcome::Unavailable { target: "Won't Do".into() });
        assert!(jira.writes().is_empty());
    }
}
