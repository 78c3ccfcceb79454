//! Domain types shared by the engine, the tracker clients and the CLI.
//!
//! Identifiers are newtypes so a Jira key can never be passed where a Linear
//! issue id is expected. Remote payload shapes are normalised here; the wire
//! formats themselves live in `trackbridge-clients`.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A Jira issue key such as `ABC-123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueKey(pub String);

impl IssueKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for IssueKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IssueKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A Linear issue id (UUID form as returned by the GraphQL API).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinearIssueId(pub String);

impl LinearIssueId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinearIssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for LinearIssueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LinearIssueId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A Jira comment id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JiraCommentId(pub String);

impl JiraCommentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JiraCommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for JiraCommentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JiraCommentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A Linear comment id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinearCommentId(pub String);

impl LinearCommentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LinearCommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for LinearCommentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for LinearCommentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Jira's coarse status classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCategory {
    New,
    Indeterminate,
    Done,
}

impl StatusCategory {
    /// Parse the `statusCategory.key` value Jira reports.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "new" => Some(Self::New),
            "indeterminate" => Some(Self::Indeterminate),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Indeterminate => "indeterminate",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which tracker a piece of content originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tracker {
    Jira,
    Linear,
}

impl Tracker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jira => "jira",
            Self::Linear => "linear",
        }
    }
}

impl fmt::Display for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Jira views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraStatus {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<StatusCategory>,
}

/// The slice of a Jira issue the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraIssue {
    pub key: IssueKey,
    pub status: JiraStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// A Jira comment. `body` is the raw ADF document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JiraComment {
    pub id: JiraCommentId,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub body: Value,
}

/// A legal workflow move for a Jira issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraTransition {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_status: Option<String>,
}

// ---------------------------------------------------------------------------
// Linear views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearAttachment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearComment {
    pub id: LinearCommentId,
    pub body: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// Everything the engine needs about one Linear issue, fetched in one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearIssueView {
    pub id: LinearIssueId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub team_id: String,
    pub state_name: String,
    #[serde(default)]
    pub attachments: Vec<LinearAttachment>,
    #[serde(default)]
    pub comments: Vec<LinearComment>,
}

/// Workflow state name → state id for one Linear team.
pub type TeamStates = HashMap<String, String>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(IssueKey::from("ABC-1").to_string(), "ABC-1");
        assert_eq!(LinearIssueId::from("lin-1").to_string(), "lin-1");
        assert_eq!(JiraCommentId::from("10001").to_string(), "10001");
        assert_eq!(LinearCommentId::from("c-1").to_string(), "c-1");
    }

    #[test]
    fn status_category_parses_known_keys_only() {
        assert_eq!(StatusCategory::from_key("done"), Some(StatusCategory::Done));
        assert_eq!(StatusCategory::from_key("new"), Some(StatusCategory::New));
        assert_eq!(StatusCategory::from_key("undefined"), None);
        assert_eq!(StatusCategory::from_key("Done"), None);
    }

    #[test]
    fn issue_view_serde_roundtrip() {
        let view = LinearIssueView {
            id: LinearIssueId::from("lin-1"),
            title: "Fix login".to_string(),
            description: None,
            url: Some("https://linear.app/acme/issue/ENG-1".to_string()),
            team_id: "team-1".to_string(),
            state_name: "Todo".to_string(),
            attachments: vec![],
            comments: vec![],
        };
        let json = serde_json::to_string(&view).expect("serialize");
        let back: LinearIssueView = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, view);
    }
}
