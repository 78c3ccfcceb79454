//! Linear GraphQL client.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use trackbridge_core::{
    LinearApi, LinearComment, LinearCommentId, LinearIssueId, LinearIssueView, TeamStates,
    Tracker, TrackerError,
};
use trackbridge_core::types::LinearAttachment;

use crate::http;

const PAGE_SIZE: u32 = 50;

const ISSUE_SYNC_VIEW_QUERY: &str = r#"
query IssueSyncView($id: String!, $first: Int!) {
  issue(id: $id) {
    id
    title
    description
    url
    team { id }
    state { id name }
    attachments(first: $first) {
      nodes { id url }
      pageInfo { hasNextPage endCursor }
    }
    comments(first: $first) {
      nodes { id body createdAt user { id name } }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

const ISSUE_ATTACHMENTS_QUERY: &str = r#"
query IssueAttachments($id: String!, $first: Int!, $after: String) {
  issue(id: $id) {
    page: attachments(first: $first, after: $after) {
      nodes { id url }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

const ISSUE_COMMENTS_QUERY: &str = r#"
query IssueComments($id: String!, $first: Int!, $after: String) {
  issue(id: $id) {
    page: comments(first: $first, after: $after) {
      nodes { id body createdAt user { id name } }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

const PROJECT_ISSUES_QUERY: &str = r#"
query ProjectIssues($projectId: String!, $first: Int!, $after: String) {
  project(id: $projectId) {
    issues(first: $first, after: $after) {
      nodes { id }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

const TEAM_STATES_QUERY: &str = r#"
query TeamStates($id: String!) {
  team(id: $id) {
    states { nodes { id name } }
  }
}
"#;

const UPDATE_ISSUE_STATE_MUTATION: &str = r#"
mutation UpdateIssueState($id: String!, $stateId: String!) {
  issueUpdate(id: $id, input: { stateId: $stateId }) {
    success
  }
}
"#;

const COMMENT_CREATE_MUTATION: &str = r#"
mutation CommentCreate($issueId: String!, $body: String!) {
  commentCreate(input: { issueId: $issueId, body: $body }) {
    success
    comment { id }
  }
}
"#;

pub struct LinearClient {
    endpoint: String,
    api_key: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for LinearClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinearClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl LinearClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            agent: http::agent(),
        }
    }

    /// Run one GraphQL operation and decode its `data` payload.
    fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        variables: Value,
    ) -> Result<T, TrackerError> {
        tracing::debug!("linear {operation}");
        let response = http::check(
            Tracker::Linear,
            self.agent
                .post(&self.endpoint)
                .set("Content-Type", "application/json")
                .set("Authorization", &self.api_key)
                .send_json(json!({ "query": query, "variables": variables })),
        )?;
        let envelope: GraphqlEnvelope = http::read_json(Tracker::Linear, response)?;
        let data = envelope.into_data(operation)?;
        serde_json::from_value(data).map_err(|e| TrackerError::Decode {
            tracker: Tracker::Linear,
            message: format!("{operation}: {e}"),
        })
    }

    /// One follow-up page of an issue connection, starting after `after`.
    fn issue_page<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: &str,
        id: &LinearIssueId,
        after: &str,
    ) -> Result<Page<T>, TrackerError> {
        let data: IssuePageData<T> = self.execute(
            operation,
            query,
            json!({ "id": id.as_str(), "first": PAGE_SIZE, "after": after }),
        )?;
        data.issue
            .map(|issue| issue.page)
            .ok_or_else(|| not_found("issue", id.as_str()))
    }
}

/// Nodes of every page after `first`, fetched cursor by cursor. Stops when
/// the server reports no next page or hands back the cursor it was given.
fn follow_pages<T>(
    first: &Page<T>,
    mut fetch: impl FnMut(&str) -> Result<Page<T>, TrackerError>,
) -> Result<Vec<T>, TrackerError> {
    let mut rest = Vec::new();
    let mut cursor = first.next_cursor().map(str::to_string);
    while let Some(after) = cursor {
        let page = fetch(&after)?;
        cursor = page
            .next_cursor()
            .filter(|next| *next != after)
            .map(str::to_string);
        rest.extend(page.nodes);
    }
    Ok(rest)
}

impl LinearApi for LinearClient {
    fn fetch_issue_sync_view(&self, id: &LinearIssueId) -> Result<LinearIssueView, TrackerError> {
        let data: IssueData = self.execute(
            "IssueSyncView",
            ISSUE_SYNC_VIEW_QUERY,
            json!({ "id": id.as_str(), "first": PAGE_SIZE }),
        )?;
        let mut issue = data.issue.ok_or_else(|| not_found("issue", id.as_str()))?;
        if let Some(page) = issue.attachments.as_mut() {
            let rest = follow_pages(page, |after| {
                self.issue_page("IssueAttachments", ISSUE_ATTACHMENTS_QUERY, id, after)
            })?;
            page.nodes.extend(rest);
        }
        if let Some(page) = issue.comments.as_mut() {
            let rest = follow_pages(page, |after| {
                self.issue_page("IssueComments", ISSUE_COMMENTS_QUERY, id, after)
            })?;
            page.nodes.extend(rest);
        }
        Ok(issue.into_view())
    }

    fn fetch_project_issue_ids(
        &self,
        project_id: &str,
    ) -> Result<Vec<LinearIssueId>, TrackerError> {
        let page = |after: Option<&str>| -> Result<Page<RawIdNode>, TrackerError> {
            let data: ProjectData = self.execute(
                "ProjectIssues",
                PROJECT_ISSUES_QUERY,
                json!({ "projectId": project_id, "first": PAGE_SIZE, "after": after }),
            )?;
            Ok(data
                .project
                .ok_or_else(|| not_found("project", project_id))?
                .issues)
        };
        let first = page(None)?;
        let rest = follow_pages(&first, |after| page(Some(after)))?;
        Ok(first
            .nodes
            .into_iter()
            .chain(rest)
            .map(|n| LinearIssueId::from(n.id))
            .collect())
    }

    fn fetch_team_states_by_name(&self, team_id: &str) -> Result<TeamStates, TrackerError> {
        let data: TeamData =
            self.execute("TeamStates", TEAM_STATES_QUERY, json!({ "id": team_id }))?;
        let team = data.team.ok_or_else(|| not_found("team", team_id))?;
        Ok(team
            .states
            .nodes
            .into_iter()
            .map(|s| (s.name, s.id))
            .collect())
    }

    fn update_issue_state(&self, id: &LinearIssueId, state_id: &str) -> Result<(), TrackerError> {
        let data: IssueUpdateData = self.execute(
            "UpdateIssueState",
            UPDATE_ISSUE_STATE_MUTATION,
            json!({ "id": id.as_str(), "stateId": state_id }),
        )?;
        if !data.issue_update.success {
            return Err(rejected("issueUpdate", format!("issue {id}")));
        }
        Ok(())
    }

    fn create_comment(
        &self,
        id: &LinearIssueId,
        body: &str,
    ) -> Result<LinearCommentId, TrackerError> {
        let data: CommentCreateData = self.execute(
            "CommentCreate",
            COMMENT_CREATE_MUTATION,
            json!({ "issueId": id.as_str(), "body": body }),
        )?;
        match data.comment_create {
            CommentCreatePayload {
                success: true,
                comment: Some(comment),
            } => Ok(LinearCommentId::from(comment.id)),
            _ => Err(rejected("commentCreate", format!("issue {id}"))),
        }
    }
}

fn not_found(entity: &'static str, id: &str) -> TrackerError {
    TrackerError::NotFound {
        tracker: Tracker::Linear,
        entity,
        id: id.to_string(),
    }
}

fn rejected(operation: &'static str, message: String) -> TrackerError {
    TrackerError::Rejected {
        tracker: Tracker::Linear,
        operation,
        message,
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

impl GraphqlEnvelope {
    fn into_data(self, operation: &'static str) -> Result<Value, TrackerError> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join(" | ");
            return Err(rejected(operation, message));
        }
        match self.data {
            Some(data) if !data.is_null() => Ok(data),
            _ => Err(TrackerError::Decode {
                tracker: Tracker::Linear,
                message: format!("{operation}: response carried no data"),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssueData {
    issue: Option<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    team: RawTeamRef,
    state: RawState,
    #[serde(default)]
    attachments: Option<Page<RawAttachment>>,
    #[serde(default)]
    comments: Option<Page<RawComment>>,
}

#[derive(Debug, Deserialize)]
struct RawTeamRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawState {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Nodes<T> {
    nodes: Vec<T>,
}

/// A connection page. `pageInfo` is absent when the query did not ask for it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    nodes: Vec<T>,
    #[serde(default)]
    page_info: Option<RawPageInfo>,
}

impl<T> Page<T> {
    fn next_cursor(&self) -> Option<&str> {
        match &self.page_info {
            Some(RawPageInfo {
                has_next_page: true,
                end_cursor: Some(cursor),
            }) => Some(cursor),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IssuePageData<T> {
    issue: Option<IssuePage<T>>,
}

#[derive(Debug, Deserialize)]
struct IssuePage<T> {
    page: Page<T>,
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    user: Option<RawUser>,
}

#[derive(Debug, Deserialize)]
struct RawUser {
    id: String,
    #[serde(default)]
    name: Option<String>,
}

impl RawIssue {
    fn into_view(self) -> LinearIssueView {
        LinearIssueView {
            id: LinearIssueId::from(self.id),
            title: self.title,
            description: self.description,
            url: self.url,
            team_id: self.team.id,
            state_name: self.state.name,
            attachments: self
                .attachments
                .map(|a| a.nodes)
                .unwrap_or_default()
                .into_iter()
                .map(|a| LinearAttachment { url: a.url })
                .collect(),
            comments: self
                .comments
                .map(|c| c.nodes)
                .unwrap_or_default()
                .into_iter()
                .map(|c| LinearComment {
                    id: LinearCommentId::from(c.id),
                    body: c.body,
                    created_at: c.created_at,
                    author: c.user.map(|u| u.name.unwrap_or(u.id)),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectData {
    project: Option<RawProject>,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    issues: Page<RawIdNode>,
}

#[derive(Debug, Deserialize)]
struct RawIdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageInfo {
    has_next_page: bool,
    #[serde(default)]
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamData {
    team: Option<RawTeam>,
}

#[derive(Debug, Deserialize)]
struct RawTeam {
    states: Nodes<RawState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueUpdateData {
    issue_update: SuccessPayload,
}

#[derive(Debug, Deserialize)]
struct SuccessPayload {
    success: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentCreateData {
    comment_create: CommentCreatePayload,
}

#[derive(Debug, Deserialize)]
struct CommentCreatePayload {
    success: bool,
    #[serde(default)]
    comment: Option<RawIdNode>,
}
