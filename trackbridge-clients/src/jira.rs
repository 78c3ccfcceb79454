//! Jira Cloud REST v3 client.
//!
//! Authenticates with `Basic base64(email:api_token)`. Issue keys go into
//! REST paths unescaped, so a key holding anything but ASCII letters, digits,
//! `-` or `_` (a hand-edited store entry, say) is refused as not found
//! before any request is sent.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use trackbridge_core::adf::plain_text_to_adf;
use trackbridge_core::config::JiraCredentials;
use trackbridge_core::{
    IssueKey, JiraApi, JiraComment, JiraCommentId, JiraIssue, JiraStatus, JiraTransition,
    StatusCategory, Tracker, TrackerError,
};

use crate::http;

const COMMENT_PAGE_SIZE: u64 = 100;

pub struct JiraClient {
    base_url: String,
    auth_header: String,
    agent: ureq::Agent,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("auth_header", &"<redacted>")
            .finish()
    }
}

impl JiraClient {
    pub fn new(credentials: &JiraCredentials) -> Self {
        Self {
            base_url: normalize_base_url(&credentials.base_url),
            auth_header: basic_auth_header(&credentials.email, &credentials.api_token),
            agent: http::agent(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn issue_url(&self, key: &IssueKey, suffix: &str) -> Result<String, TrackerError> {
        let path_safe = !key.as_str().is_empty()
            && key
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !path_safe {
            return Err(TrackerError::NotFound {
                tracker: Tracker::Jira,
                entity: "issue",
                id: key.to_string(),
            });
        }
        Ok(format!("{}/rest/api/3/issue/{}{}", self.base_url, key, suffix))
    }

    fn get(&self, url: &str) -> Result<ureq::Response, TrackerError> {
        tracing::debug!("jira GET {url}");
        http::check(
            Tracker::Jira,
            self.agent
                .get(url)
                .set("Accept", "application/json")
                .set("Authorization", &self.auth_header)
                .call(),
        )
    }

    fn post(&self, url: &str, body: Value) -> Result<ureq::Response, TrackerError> {
        tracing::debug!("jira POST {url}");
        http::check(
            Tracker::Jira,
            self.agent
                .post(url)
                .set("Accept", "application/json")
                .set("Authorization", &self.auth_header)
                .send_json(body),
        )
    }
}

/// Maps a 404 on an issue path to [`TrackerError::NotFound`].
fn issue_not_found(key: &IssueKey, err: TrackerError) -> TrackerError {
    match err {
        TrackerError::Http { status: 404, .. } => TrackerError::NotFound {
            tracker: Tracker::Jira,
            entity: "issue",
            id: key.to_string(),
        },
        other => other,
    }
}

impl JiraApi for JiraClient {
    fn get_issue(&self, key: &IssueKey) -> Result<JiraIssue, TrackerError> {
        let url = self.issue_url(key, "?fields=status,updated")?;
        let response = self.get(&url).map_err(|e| issue_not_found(key, e))?;
        let raw: RawIssue = http::read_json(Tracker::Jira, response)?;
        Ok(raw.into_issue())
    }

    fn list_comments(&self, key: &IssueKey) -> Result<Vec<JiraComment>, TrackerError> {
        let mut comments = Vec::new();
        let mut start_at = 0;
        loop {
            let url = self.issue_url(
                key,
                &format!("/comment?startAt={start_at}&maxResults={COMMENT_PAGE_SIZE}"),
            )?;
            let response = self.get(&url).map_err(|e| issue_not_found(key, e))?;
            let page: RawCommentPage = http::read_json(Tracker::Jira, response)?;
            let fetched = page.comments.len();
            comments.extend(page.comments.into_iter().map(RawComment::into_comment));
            if fetched == 0 || comments.len() as u64 >= page.total {
                break;
            }
            start_at = page.start_at + page.max_results.max(fetched as u64);
        }
        Ok(comments)
    }

    fn add_comment(&self, key: &IssueKey, text: &str) -> Result<JiraCommentId, TrackerError> {
        let url = self.issue_url(key, "/comment")?;
        let response = self
            .post(&url, json!({ "body": plain_text_to_adf(text) }))
            .map_err(|e| issue_not_found(key, e))?;
        let created: RawCreated = http::read_json(Tracker::Jira, response)?;
        Ok(JiraCommentId::from(created.id))
    }

    fn list_transitions(&self, key: &IssueKey) -> Result<Vec<JiraTransition>, TrackerError> {
        let url = self.issue_url(key, "/transitions")?;
        let response = self.get(&url).map_err(|e| issue_not_found(key, e))?;
        let raw: RawTransitions = http::read_json(Tracker::Jira, response)?;
        Ok(raw
            .transitions
            .into_iter()
            .map(|t| JiraTransition {
                id: t.id,
                name: t.name,
                target_status: t.to.and_then(|to| to.name),
            })
            .collect())
    }

    fn apply_transition(&self, key: &IssueKey, transition_id: &str) -> Result<(), TrackerError> {
        let url = self.issue_url(key, "/transitions")?;
        self.post(&url, json!({ "transition": { "id": transition_id } }))
            .map_err(|e| issue_not_found(key, e))?;
        Ok(())
    }
}

/// Strip trailing slashes so paths can be appended directly.
pub fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}

pub fn basic_auth_header(email: &str, api_token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{api_token}")))
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawIssue {
    key: String,
    fields: RawFields,
}

#[derive(Debug, Deserialize)]
struct RawFields {
    status: RawStatus,
    #[serde(default)]
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatus {
    name: String,
    #[serde(default)]
    status_category: Option<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    #[serde(default)]
    key: Option<String>,
}

impl RawIssue {
    fn into_issue(self) -> JiraIssue {
        let category = self
            .fields
            .status
            .status_category
            .and_then(|c| c.key)
            .and_then(|k| StatusCategory::from_key(&k));
        JiraIssue {
            key: IssueKey::from(self.key),
            status: JiraStatus {
                name: self.fields.status.name,
                category,
            },
            updated_at: self.fields.updated,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCommentPage {
    #[serde(default)]
    start_at: u64,
    #[serde(default)]
    max_results: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    #[serde(default)]
    created: String,
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAuthor {
    #[serde(default)]
    display_name: Option<String>,
}

impl RawComment {
    fn into_comment(self) -> JiraComment {
        JiraComment {
            id: JiraCommentId::from(self.id),
            created_at: self.created,
            author: self.author.and_then(|a| a.display_name),
            body: self.body,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawTransitions {
    #[serde(default)]
    transitions: Vec<RawTransition>,
}

#[derive(Debug, Deserialize)]
struct RawTransition {
    id: String,
    name: String,
    #[serde(default)]
    to: Option<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCreated {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://acme.atlassian.net", "https://acme.atlassian.net")]
    #[case("https://acme.atlassian.net/", "https://acme.atlassian.net")]
    #[case("https://acme.atlassian.net///", "https://acme.atlassian.net")]
    #[case(" https://acme.atlassian.net/ ", "https://acme.atlassian.net")]
    fn base_url_trailing_slashes_are_stripped(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_base_url(raw), expected);
    }

    #[test]
    fn basic_auth_encodes_email_and_token() {
        // base64("bot@acme.io:s3cret")
        assert_eq!(
            basic_auth_header("bot@acme.io", "s3cret"),
            "Basic Ym90QGFjbWUuaW86czNjcmV0"
        );
    }

    #[test]
    fn issue_payload_decodes_status_category() {
        let raw: RawIssue = http::decode(
            Tracker::Jira,
            r#"{"key":"ABC-1","fields":{"status":{"id":"3","name":"Done",
                "statusCategory":{"key":"done","name":"Done"}},"updated":"2026-02-01T10:00:00.000+0000"}}"#,
        )
        .unwrap();
        let issue = raw.into_issue();
        assert_eq!(issue.key, IssueKey::from("ABC-1"));
        assert_eq!(issue.status.name, "Done");
        assert_eq!(issue.status.category, Some(StatusCategory::Done));
        assert!(issue.updated_at.is_some());
    }

    #[test]
    fn unknown_category_decodes_as_none() {
        let raw: RawIssue = http::decode(
            Tracker::Jira,
            r#"{"key":"ABC-2","fields":{"status":{"name":"Weird","statusCategory":{"key":"undefined"}}}}"#,
        )
        .unwrap();
        assert_eq!(raw.into_issue().status.category, None);
    }

    #[test]
    fn comment_page_decodes_authors_and_bodies() {
        let page: RawCommentPage = http::decode(
            Tracker::Jira,
            r#"{"startAt":0,"maxResults":100,"total":2,"comments":[
                {"id":"10001","created":"2026-01-01","author":{"displayName":"Ada"},
                 "body":{"type":"doc","version":1,"content":[]}},
                {"id":"10002","created":"2026-01-02"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(page.total, 2);
        let comments: Vec<JiraComment> =
            page.comments.into_iter().map(RawComment::into_comment).collect();
        assert_eq!(comments[0].author.as_deref(), Some("Ada"));
        assert_eq!(comments[1].author, None);
        assert!(comments[1].body.is_null());
    }

    #[test]
    fn transitions_keep_target_status_names() {
        let raw: RawTransitions = http::decode(
            Tracker::Jira,
            r#"{"transitions":[{"id":"31","name":"Finish","to":{"id":"3","name":"Done"}},
                               {"id":"11","name":"Reopen"}]}"#,
        )
        .unwrap();
        assert_eq!(raw.transitions[0].to.as_ref().and_then(|t| t.name.as_deref()), Some("Done"));
        assert!(raw.transitions[1].to.is_none());
    }

    #[test]
    fn not_found_mapping_only_touches_404() {
        let key = IssueKey::from("ABC-9");
        let err = issue_not_found(
            &key,
            TrackerError::Http { tracker: Tracker::Jira, status: 404, body: String::new() },
        );
        assert!(matches!(err, TrackerError::NotFound { .. }));

        let err = issue_not_found(
            &key,
            TrackerError::Http { tracker: Tracker::Jira, status: 401, body: String::new() },
        );
        assert!(matches!(err, TrackerError::Http { status: 401, .. }));
    }

    fn client() -> JiraClient {
        JiraClient::new(&JiraCredentials {
            base_url: "https://acme.atlassian.net/".into(),
            email: "bot@acme.io".into(),
            api_token: "s3cret".into(),
        })
    }

    #[test]
    fn issue_url_joins_base_key_and_suffix() {
        assert_eq!(
            client().issue_url(&IssueKey::from("ABC-12"), "/comment").unwrap(),
            "https://acme.atlassian.net/rest/api/3/issue/ABC-12/comment"
        );
    }

    #[rstest]
    #[case("ABC-1/../../myself")]
    #[case("ABC-1?jql=x")]
    #[case("ABC 1")]
    #[case("ABC-1#frag")]
    #[case("")]
    fn path_unsafe_keys_are_refused_before_any_request(#[case] raw: &str) {
        let client = client();
        let key = IssueKey::from(raw);
        let err = client.issue_url(&key, "/transitions").unwrap_err();
        assert!(matches!(err, TrackerError::NotFound { .. }), "got {err}");
        assert!(err.is_unresolvable());
        assert!(matches!(
            client.get_issue(&key),
            Err(TrackerError::NotFound { .. })
        ));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let dbg = format!("{:?}", client());
        assert!(!dbg.contains("Ym90"));
        assert!(dbg.contains("https://acme.atlassian.net\""));
    }
}
