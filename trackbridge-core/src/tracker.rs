//! Capability traits the reconciliation engine consumes.
//!
//! Both traits are blocking: every call returns only once the remote read or
//! write has completed or failed. Implementations must be `Send + Sync` so the
//! engine can issue independent reads for one issue from scoped threads.

use crate::error::TrackerError;
use crate::types::{
    IssueKey, JiraComment, JiraCommentId, JiraIssue, JiraTransition, LinearCommentId,
    LinearIssueId, LinearIssueView, TeamStates,
};

/// Jira (REST) operations.
pub trait JiraApi: Send + Sync {
    fn get_issue(&self, key: &IssueKey) -> Result<JiraIssue, TrackerError>;

    /// Every comment on the issue, oldest first; pagination is followed to the end.
    fn list_comments(&self, key: &IssueKey) -> Result<Vec<JiraComment>, TrackerError>;

    /// Post `text` as a new comment and return its id.
    fn add_comment(&self, key: &IssueKey, text: &str) -> Result<JiraCommentId, TrackerError>;

    fn list_transitions(&self, key: &IssueKey) -> Result<Vec<JiraTransition>, TrackerError>;

    fn apply_transition(&self, key: &IssueKey, transition_id: &str) -> Result<(), TrackerError>;
}

/// Linear (GraphQL) operations.
pub trait LinearApi: Send + Sync {
    fn fetch_issue_sync_view(&self, id: &LinearIssueId) -> Result<LinearIssueView, TrackerError>;

    /// Every issue id in the project; pagination is followed to the end.
    fn fetch_project_issue_ids(&self, project_id: &str)
        -> Result<Vec<LinearIssueId>, TrackerError>;

    fn fetch_team_states_by_name(&self, team_id: &str) -> Result<TeamStates, TrackerError>;

    fn update_issue_state(&self, id: &LinearIssueId, state_id: &str) -> Result<(), TrackerError>;

    fn create_comment(&self, id: &LinearIssueId, body: &str)
        -> Result<LinearCommentId, TrackerError>;
}
