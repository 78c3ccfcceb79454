//! In-memory trackers for engine and pipeline tests.
//!
//! Both fakes keep their state behind a `Mutex`, record every write, and can
//! be told to fail a named operation with a transport error.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::adf::plain_text_to_adf;
use crate::error::TrackerError;
use crate::tracker::{JiraApi, LinearApi};
use crate::types::{
    IssueKey, JiraComment, JiraCommentId, JiraIssue, JiraStatus, JiraTransition, LinearAttachment,
    LinearComment, LinearCommentId, LinearIssueId, LinearIssueView, StatusCategory, TeamStates,
    Tracker,
};

const FAKE_TIMESTAMP: &str = "2026-01-01T00:00:00.000Z";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn injected(tracker: Tracker, failing: &HashSet<&'static str>, op: &'static str) -> Result<(), TrackerError> {
    if failing.contains(op) {
        return Err(TrackerError::Transport {
            tracker,
            message: format!("injected failure in {op}"),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Jira
// ---------------------------------------------------------------------------

/// A write the engine performed against [`FakeJira`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JiraWrite {
    Comment { key: IssueKey, text: String },
    Transition { key: IssueKey, transition_id: String },
}

#[derive(Debug, Default)]
struct JiraState {
    issues: HashMap<IssueKey, JiraIssue>,
    comments: HashMap<IssueKey, Vec<JiraComment>>,
    transitions: HashMap<IssueKey, Vec<JiraTransition>>,
    categories: HashMap<String, StatusCategory>,
    writes: Vec<JiraWrite>,
    get_issue_calls: usize,
    next_comment: u64,
    failing: HashSet<&'static str>,
}

#[derive(Debug, Default)]
pub struct FakeJira {
    state: Mutex<JiraState>,
}

impl FakeJira {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue whose status `name` belongs to `category`.
    pub fn with_issue(self, key: &str, status: &str, category: StatusCategory) -> Self {
        {
            let mut state = lock(&self.state);
            state.categories.insert(status.to_string(), category);
            state.issues.insert(
                IssueKey::from(key),
                JiraIssue {
                    key: IssueKey::from(key),
                    status: JiraStatus {
                        name: status.to_string(),
                        category: Some(category),
                    },
                    updated_at: Some(FAKE_TIMESTAMP.to_string()),
                },
            );
        }
        self
    }

    /// Add a plain-text comment (stored as ADF).
    pub fn with_comment(self, key: &str, id: &str, author: &str, text: &str) -> Self {
        lock(&self.state)
            .comments
            .entry(IssueKey::from(key))
            .or_default()
            .push(JiraComment {
                id: JiraCommentId::from(id),
                created_at: FAKE_TIMESTAMP.to_string(),
                author: Some(author.to_string()),
                body: plain_text_to_adf(text),
            });
        self
    }

    /// Add a transition leading to status `target` (category `category`).
    pub fn with_transition(
        self,
        key: &str,
        id: &str,
        name: &str,
        target: Option<(&str, StatusCategory)>,
    ) -> Self {
        {
            let mut state = lock(&self.state);
            if let Some((status, category)) = target {
                state.categories.insert(status.to_string(), category);
            }
            state
                .transitions
                .entry(IssueKey::from(key))
                .or_default()
                .push(JiraTransition {
                    id: id.to_string(),
                    name: name.to_string(),
                    target_status: target.map(|(status, _)| status.to_string()),
                });
        }
        self
    }

    /// Make every call to `op` (trait method name) fail with a transport error.
    pub fn fail_on(&self, op: &'static str) {
        lock(&self.state).failing.insert(op);
    }

    pub fn writes(&self) -> Vec<JiraWrite> {
        lock(&self.state).writes.clone()
    }

    pub fn get_issue_calls(&self) -> usize {
        lock(&self.state).get_issue_calls
    }

    pub fn status_of(&self, key: &str) -> Option<String> {
        lock(&self.state)
            .issues
            .get(&IssueKey::from(key))
            .map(|issue| issue.status.name.clone())
    }

    pub fn comments_on(&self, key: &str) -> Vec<JiraComment> {
        lock(&self.state)
            .comments
            .get(&IssueKey::from(key))
            .cloned()
            .unwrap_or_default()
    }

    fn not_found(key: &IssueKey) -> TrackerError {
        TrackerError::NotFound {
            tracker: Tracker::Jira,
            entity: "issue",
            id: key.0.clone(),
        }
    }
}

impl JiraApi for FakeJira {
    fn get_issue(&self, key: &IssueKey) -> Result<JiraIssue, TrackerError> {
        let mut state = lock(&self.state);
        injected(Tracker::Jira, &state.failing, "get_issue")?;
        state.get_issue_calls += 1;
        state.issues.get(key).cloned().ok_or_else(|| Self::not_found(key))
    }

    fn list_comments(&self, key: &IssueKey) -> Result<Vec<JiraComment>, TrackerError> {
        let state = lock(&self.state);
        injected(Tracker::Jira, &state.failing, "list_comments")?;
        if !state.issues.contains_key(key) {
            return Err(Self::not_found(key));
        }
        Ok(state.comments.get(key).cloned().unwrap_or_default())
    }

    fn add_comment(&self, key: &IssueKey, text: &str) -> Result<JiraCommentId, TrackerError> {
        let mut state = lock(&self.state);
        injected(Tracker::Jira, &state.failing, "add_comment")?;
        if !state.issues.contains_key(key) {
            return Err(Self::not_found(key));
        }
        state.next_comment += 1;
        let id = JiraCommentId::from(format!("90{:03}", state.next_comment));
        state.comments.entry(key.clone()).or_default().push(JiraComment {
            id: id.clone(),
            created_at: FAKE_TIMESTAMP.to_string(),
            author: Some("trackbridge".to_string()),
            body: plain_text_to_adf(text),
        });
        state.writes.push(JiraWrite::Comment {
            key: key.clone(),
            text: text.to_string(),
        });
        Ok(id)
    }

    fn list_transitions(&self, key: &IssueKey) -> Result<Vec<JiraTransition>, TrackerError> {
        let state = lock(&self.state);
        injected(Tracker::Jira, &state.failing, "list_transitions")?;
        Ok(state.transitions.get(key).cloned().unwrap_or_default())
    }

    fn apply_transition(&self, key: &IssueKey, transition_id: &str) -> Result<(), TrackerError> {
        let mut state = lock(&self.state);
        injected(Tracker::Jira, &state.failing, "apply_transition")?;
        let transition = state
            .transitions
            .get(key)
            .and_then(|all| all.iter().find(|t| t.id == transition_id))
            .cloned()
            .ok_or_else(|| TrackerError::Rejected {
                tracker: Tracker::Jira,
                operation: "transition",
                message: format!("transition {transition_id} is not available for {key}"),
            })?;
        let target = transition.target_status.unwrap_or(transition.name);
        let category = state.categories.get(&target).copied();
        if let Some(issue) = state.issues.get_mut(key) {
            issue.status = JiraStatus {
                name: target,
                category: category.or(issue.status.category),
            };
        }
        state.writes.push(JiraWrite::Transition {
            key: key.clone(),
            transition_id: transition_id.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Linear
// ---------------------------------------------------------------------------

/// A write the engine performed against [`FakeLinear`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinearWrite {
    StateUpdate { issue: LinearIssueId, state_id: String },
    Comment { issue: LinearIssueId, body: String },
}

#[derive(Debug, Default)]
struct LinearState {
    projects: HashMap<String, Vec<LinearIssueId>>,
    issues: HashMap<LinearIssueId, LinearIssueView>,
    teams: HashMap<String, TeamStates>,
    writes: Vec<LinearWrite>,
    team_state_fetches: usize,
    next_comment: u64,
    failing: HashSet<&'static str>,
}

#[derive(Debug, Default)]
pub struct FakeLinear {
    state: Mutex<LinearState>,
}

/// Builder input for one fake Linear issue.
#[derive(Debug, Clone)]
pub struct FakeIssue {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub team_id: String,
    pub state_name: String,
    pub attachment_urls: Vec<String>,
}

impl FakeIssue {
    pub fn new(id: &str, title: &str, state_name: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            team_id: "team-1".to_string(),
            state_name: state_name.to_string(),
            attachment_urls: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn attachment(mut self, url: &str) -> Self {
        self.attachment_urls.push(url.to_string());
        self
    }

    pub fn team(mut self, team_id: &str) -> Self {
        self.team_id = team_id.to_string();
        self
    }
}

impl FakeLinear {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `issue` to `project`.
    pub fn with_issue(self, project: &str, issue: FakeIssue) -> Self {
        {
            let mut state = lock(&self.state);
            let id = LinearIssueId::from(issue.id.as_str());
            state
                .projects
                .entry(project.to_string())
                .or_default()
                .push(id.clone());
            state.issues.insert(
                id.clone(),
                LinearIssueView {
                    id,
                    title: issue.title,
                    description: issue.description,
                    url: Some(format!("https://linear.app/acme/issue/{}", issue.id)),
                    team_id: issue.team_id,
                    state_name: issue.state_name,
                    attachments: issue
                        .attachment_urls
                        .into_iter()
                        .map(|url| LinearAttachment { url: Some(url) })
                        .collect(),
                    comments: Vec::new(),
                },
            );
        }
        self
    }

    pub fn with_comment(self, issue: &str, id: &str, author: &str, body: &str) -> Self {
        if let Some(view) = lock(&self.state).issues.get_mut(&LinearIssueId::from(issue)) {
            view.comments.push(LinearComment {
                id: LinearCommentId::from(id),
                body: body.to_string(),
                created_at: FAKE_TIMESTAMP.to_string(),
                author: Some(author.to_string()),
            });
        }
        self
    }

    /// Register workflow states (`(name, id)`) for `team`.
    pub fn with_team_states(self, team: &str, states: &[(&str, &str)]) -> Self {
        lock(&self.state).teams.insert(
            team.to_string(),
            states
                .iter()
                .map(|(name, id)| (name.to_string(), id.to_string()))
                .collect(),
        );
        self
    }

    pub fn fail_on(&self, op: &'static str) {
        lock(&self.state).failing.insert(op);
    }

    pub fn writes(&self) -> Vec<LinearWrite> {
        lock(&self.state).writes.clone()
    }

    pub fn team_state_fetches(&self) -> usize {
        lock(&self.state).team_state_fetches
    }

    pub fn state_of(&self, issue: &str) -> Option<String> {
        lock(&self.state)
            .issues
            .get(&LinearIssueId::from(issue))
            .map(|view| view.state_name.clone())
    }

    pub fn comments_on(&self, issue: &str) -> Vec<LinearComment> {
        lock(&self.state)
            .issues
            .get(&LinearIssueId::from(issue))
            .map(|view| view.comments.clone())
            .unwrap_or_default()
    }

    fn not_found(entity: &'static str, id: &str) -> TrackerError {
        TrackerError::NotFound {
            tracker: Tracker::Linear,
            entity,
            id: id.to_string(),
        }
    }
}

impl LinearApi for FakeLinear {
    fn fetch_issue_sync_view(&self, id: &LinearIssueId) -> Result<LinearIssueView, TrackerError> {
        let state = lock(&self.state);
        injected(Tracker::Linear, &state.failing, "fetch_issue_sync_view")?;
        state
            .issues
            .get(id)
            .cloned()
            .ok_or_else(|| Self::not_found("issue", id.as_str()))
    }

    fn fetch_project_issue_ids(
        &self,
        project_id: &str,
    ) -> Result<Vec<LinearIssueId>, TrackerError> {
        let state = lock(&self.state);
        injected(Tracker::Linear, &state.failing, "fetch_project_issue_ids")?;
        state
            .projects
            .get(project_id)
            .cloned()
            .ok_or_else(|| Self::not_found("project", project_id))
    }

    fn fetch_team_states_by_name(&self, team_id: &str) -> Result<TeamStates, TrackerError> {
        let mut state = lock(&self.state);
        injected(Tracker::Linear, &state.failing, "fetch_team_states_by_name")?;
        state.team_state_fetches += 1;
        state
            .teams
            .get(team_id)
            .cloned()
            .ok_or_else(|| Self::not_found("team", team_id))
    }

    fn update_issue_state(&self, id: &LinearIssueId, state_id: &str) -> Result<(), TrackerError> {
        let mut state = lock(&self.state);
        injected(Tracker::Linear, &state.failing, "update_issue_state")?;
        let Some(team_id) = state.issues.get(id).map(|view| view.team_id.clone()) else {
            return Err(Self::not_found("issue", id.as_str()));
        };
        let name = state
            .teams
            .get(&team_id)
            .and_then(|states| states.iter().find(|(_, sid)| *sid == state_id))
            .map(|(name, _)| name.clone())
            .ok_or_else(|| TrackerError::Rejected {
                tracker: Tracker::Linear,
                operation: "issueUpdate",
                message: format!("state {state_id} does not belong to team {team_id}"),
            })?;
        if let Some(view) = state.issues.get_mut(id) {
            view.state_name = name;
        }
        state.writes.push(LinearWrite::StateUpdate {
            issue: id.clone(),
            state_id: state_id.to_string(),
        });
        Ok(())
    }

    fn create_comment(
        &self,
        id: &LinearIssueId,
        body: &str,
    ) -> Result<LinearCommentId, TrackerError> {
        let mut state = lock(&self.state);
        injected(Tracker::Linear, &state.failing, "create_comment")?;
        state.next_comment += 1;
        let comment_id = LinearCommentId::from(format!("lc-{}", state.next_comment));
        let Some(view) = state.issues.get_mut(id) else {
            return Err(Self::not_found("issue", id.as_str()));
        };
        view.comments.push(LinearComment {
            id: comment_id.clone(),
            body: body.to_string(),
            created_at: FAKE_TIMESTAMP.to_string(),
            author: Some("trackbridge".to_string()),
        });
        state.writes.push(LinearWrite::Comment {
            issue: id.clone(),
            body: body.to_string(),
        });
        Ok(comment_id)
    }
}
