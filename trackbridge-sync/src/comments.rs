//! Comment mirroring in both directions.
//!
//! A comment is mirrored at most once: its id pair is recorded in the
//! identity store after the copy is created. Copies start with a marker line
//! naming their source, and a comment carrying the marker of the other
//! direction is never copied back. A comment whose mirror text is already
//! present on the other side is paired with that comment instead of copied.

use std::collections::HashMap;

use trackbridge_core::adf::adf_to_plain_text;
use trackbridge_core::{
    IdentityStore, IssueKey, JiraApi, JiraComment, JiraCommentId, LinearApi, LinearComment,
    LinearCommentId, LinearIssueId, LinearIssueView, Tracker,
};

use crate::error::SyncError;
use crate::fetch;
use crate::marker::{has_source_marker, marker_line};

const UNKNOWN_AUTHOR: &str = "unknown";

/// Body of the Linear comment that mirrors a Jira comment with plain text `text`.
pub fn linear_body_for_jira_comment(key: &IssueKey, comment: &JiraComment, text: &str) -> String {
    [
        marker_line(
            Tracker::Jira,
            &[("key", key.as_str()), ("comment", comment.id.as_str())],
        ),
        format!("### Jira Comment ({key})"),
        format!(
            "- **Author**: {}",
            comment.author.as_deref().unwrap_or(UNKNOWN_AUTHOR)
        ),
        format!("- **Created**: {}", comment.created_at),
        String::new(),
        text.to_string(),
    ]
    .join("\n")
}

/// Plain text of the Jira comment that mirrors a Linear comment.
pub fn jira_text_for_linear_comment(issue: &LinearIssueView, comment: &LinearComment) -> String {
    let origin = issue.url.as_deref().unwrap_or(issue.id.as_str());
    [
        marker_line(
            Tracker::Linear,
            &[("issue", issue.id.as_str()), ("comment", comment.id.as_str())],
        ),
        format!("[Linear] Mirrored comment from {origin}"),
        format!(
            "Author: {}",
            comment.author.as_deref().unwrap_or(UNKNOWN_AUTHOR)
        ),
        format!("Created: {}", comment.created_at),
        String::new(),
        comment.body.clone(),
    ]
    .join("\n")
}

/// Copy new Jira comments onto the Linear issue. Returns how many were
/// created (or would be, under dry-run).
pub fn mirror_jira_to_linear(
    jira: &dyn JiraApi,
    linear: &dyn LinearApi,
    store: &IdentityStore,
    key: &IssueKey,
    id: &LinearIssueId,
    dry_run: bool,
) -> Result<usize, SyncError> {
    let (comments, issue) = fetch::both(
        || jira.list_comments(key),
        || linear.fetch_issue_sync_view(id),
    );
    let (comments, issue) = (comments?, issue?);
    let existing: HashMap<&str, &LinearCommentId> = issue
        .comments
        .iter()
        .map(|c| (c.body.as_str(), &c.id))
        .collect();

    let mut created = 0;
    for comment in &comments {
        if store.is_comment_mirrored(Tracker::Jira, comment.id.as_str())? {
            continue;
        }
        let text = adf_to_plain_text(&comment.body);
        if text.is_empty() {
            tracing::debug!("{key}: comment {} has no text", comment.id);
            continue;
        }
        if has_source_marker(&text, Tracker::Linear) {
            tracing::debug!("{key}: comment {} is a Linear mirror", comment.id);
            continue;
        }
        let body = linear_body_for_jira_comment(key, comment, &text);
        if let Some(&linear_comment) = existing.get(body.as_str()) {
            tracing::debug!(
                "{key}: comment {} already present on {id} as {linear_comment}",
                comment.id
            );
            if !dry_run {
                store.set_comment_pair(&comment.id, linear_comment)?;
            }
            continue;
        }

        if dry_run {
            tracing::info!("[dry-run] would mirror Jira comment {} to {id}", comment.id);
        } else {
            let linear_comment = linear.create_comment(id, &body)?;
            store.set_comment_pair(&comment.id, &linear_comment)?;
            tracing::info!(
                "mirrored Jira comment {} to {id} as {linear_comment}",
                comment.id
            );
        }
        created += 1;
    }
    Ok(created)
}

/// Copy new Linear comments onto the Jira issue. Returns how many were
/// created (or would be, under dry-run).
pub fn mirror_linear_to_jira(
    jira: &dyn JiraApi,
    linear: &dyn LinearApi,
    store: &IdentityStore,
    key: &IssueKey,
    id: &LinearIssueId,
    dry_run: bool,
) -> Result<usize, SyncError> {
    let (comments, issue) = fetch::both(
        || jira.list_comments(key),
        || linear.fetch_issue_sync_view(id),
    );
    let (comments, issue) = (comments?, issue?);
    let existing: HashMap<String, &JiraCommentId> = comments
        .iter()
        .map(|c| (adf_to_plain_text(&c.body), &c.id))
        .collect();

    let mut created = 0;
    for comment in &issue.comments {
        if store.is_comment_mirrored(Tracker::Linear, comment.id.as_str())? {
            continue;
        }
        if has_source_marker(&comment.body, Tracker::Jira) {
            tracing::debug!("{id}: comment {} is a Jira mirror", comment.id);
            continue;
        }
        let text = jira_text_for_linear_comment(&issue, comment);
        if let Some(&jira_comment) = existing.get(&text) {
            tracing::debug!(
                "{id}: comment {} already present on {key} as {jira_comment}",
                comment.id
            );
            if !dry_run {
                store.set_comment_pair(jira_comment, &comment.id)?;
            }
            continue;
        }

        if dry_run {
            tracing::info!("[dry-run] would mirror Linear comment {} to {key}", comment.id);
        } else {
            let jira_comment = jira.add_comment(key, &text)?;
            store.set_comment_pair(&jira_comment, &comment.id)?;
            tracing::info!(
                "mirrored Linear comment {} to {key} as {jira_comment}",
                comment.id
            );
        }
        created += 1;
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trackbridge_core::fakes::{FakeIssue, FakeJira, FakeLinear, JiraWrite, LinearWrite};
    use trackbridge_core::StatusCategory;

    struct Fixture {
        _home: TempDir,
        store: IdentityStore,
        key: IssueKey,
        id: LinearIssueId,
    }

    fn fixture() -> Fixture {
        let home = TempDir::new().unwrap();
        let store = IdentityStore::open_at(home.path());
        Fixture {
            _home: home,
            store,
            key: IssueKey::from("ABC-1"),
            id: LinearIssueId::from("lin-1"),
        }
    }

    fn jira() -> FakeJira {
        FakeJira::new().with_issue("ABC-1", "To Do", StatusCategory::New)
    }

    fn linear() -> FakeLinear {
        FakeLinear::new().with_issue("proj", FakeIssue::new("lin-1", "t", "Todo"))
    }

    #[test]
    fn linear_body_layout() {
        let comment = JiraComment {
            id: JiraCommentId::from("10001"),
            created_at: "2026-01-01T00:00:00.000+0000".into(),
            author: Some("Ada".into()),
            body: serde_json::Value::Null,
        };
        let body = linear_body_for_jira_comment(&IssueKey::from("ABC-1"), &comment, "Hello");
        assert_eq!(
            body,
            "<!-- trackbridge source:jira key:ABC-1 comment:10001 -->\n\
             ### Jira Comment (ABC-1)\n\
             - **Author**: Ada\n\
             - **Created**: 2026-01-01T00:00:00.000+0000\n\
             \n\
             Hello"
        );
    }

    #[test]
    fn jira_text_falls_back_to_issue_id_and_unknown_author() {
        let mut issue = linear()
            .fetch_issue_sync_view(&LinearIssueId::from("lin-1"))
            .unwrap();
        issue.url = None;
        let comment = LinearComment {
            id: LinearCommentId::from("c-1"),
            body: "Ship it".into(),
            created_at: "2026-01-02T00:00:00Z".into(),
            author: None,
        };
        let text = jira_text_for_linear_comment(&issue, &comment);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "<!-- trackbridge source:linear issue:lin-1 comment:c-1 -->");
        assert_eq!(lines[1], "[Linear] Mirrored comment from lin-1");
        assert_eq!(lines[2], "Author: unknown");
        assert_eq!(lines[5], "Ship it");
    }

    #[test]
    fn jira_comments_are_mirrored_once() {
        let f = fixture();
        let jira = jira().with_comment("ABC-1", "10001", "Ada", "First\nSecond");
        let linear = linear();

        let n = mirror_jira_to_linear(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 1);
        assert!(f.store.is_comment_mirrored(Tracker::Jira, "10001").unwrap());
        let bodies = linear.comments_on("lin-1");
        assert!(bodies[0].body.ends_with("\n\nFirst\nSecond"));

        let n = mirror_jira_to_linear(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 0);
        assert_eq!(linear.writes().len(), 1);
    }

    #[test]
    fn empty_and_linear_sourced_jira_comments_are_skipped() {
        let f = fixture();
        let jira = jira()
            .with_comment("ABC-1", "10001", "Ada", "")
            .with_comment(
                "ABC-1",
                "10002",
                "bot",
                "<!-- trackbridge source:linear issue:lin-1 comment:c-9 -->\nhello",
            );
        let linear = linear();

        let n = mirror_jira_to_linear(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 0);
        assert!(linear.writes().is_empty());
    }

    #[test]
    fn identical_body_already_on_linear_is_not_duplicated() {
        let f = fixture();
        let jira = jira().with_comment("ABC-1", "10001", "Ada", "Hello");
        let existing = jira.comments_on("ABC-1")[0].clone();
        let body = linear_body_for_jira_comment(&f.key, &existing, "Hello");
        let linear = linear().with_comment("lin-1", "c-1", "bot", &body);

        let n = mirror_jira_to_linear(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 0);
        assert!(linear.writes().is_empty());
        assert!(f.store.is_comment_mirrored(Tracker::Jira, "10001").unwrap());
        assert!(f.store.is_comment_mirrored(Tracker::Linear, "c-1").unwrap());
    }

    #[test]
    fn identical_text_already_on_jira_is_paired_not_duplicated() {
        let f = fixture();
        let linear = linear().with_comment("lin-1", "c-1", "Grace", "Looks good");
        let issue = linear.fetch_issue_sync_view(&f.id).unwrap();
        let text = jira_text_for_linear_comment(&issue, &issue.comments[0]);
        let jira = jira().with_comment("ABC-1", "10001", "bot", &text);

        let n = mirror_linear_to_jira(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 0);
        assert!(jira.writes().is_empty());
        assert!(f.store.is_comment_mirrored(Tracker::Linear, "c-1").unwrap());
        assert!(f.store.is_comment_mirrored(Tracker::Jira, "10001").unwrap());

        // The paired Jira comment is not copied back to Linear either.
        let n = mirror_jira_to_linear(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 0);
        assert!(linear.writes().is_empty());
    }

    #[test]
    fn dry_run_leaves_an_already_present_copy_unpaired() {
        let f = fixture();
        let linear = linear().with_comment("lin-1", "c-1", "Grace", "Looks good");
        let issue = linear.fetch_issue_sync_view(&f.id).unwrap();
        let text = jira_text_for_linear_comment(&issue, &issue.comments[0]);
        let jira = jira().with_comment("ABC-1", "10001", "bot", &text);

        let n = mirror_linear_to_jira(&jira, &linear, &f.store, &f.key, &f.id, true).unwrap();
        assert_eq!(n, 0);
        assert_eq!(f.store.load().unwrap().comment_pair_count(), 0);
    }

    #[test]
    fn dry_run_counts_without_writing_or_recording() {
        let f = fixture();
        let jira = jira().with_comment("ABC-1", "10001", "Ada", "Hello");
        let linear = linear().with_comment("lin-1", "c-1", "Grace", "Hi from Linear");

        assert_eq!(
            mirror_jira_to_linear(&jira, &linear, &f.store, &f.key, &f.id, true).unwrap(),
            1
        );
        assert_eq!(
            mirror_linear_to_jira(&jira, &linear, &f.store, &f.key, &f.id, true).unwrap(),
            1
        );
        assert!(linear.writes().is_empty());
        assert!(jira.writes().is_empty());
        assert_eq!(f.store.load().unwrap().comment_pair_count(), 0);
    }

    #[test]
    fn linear_comments_are_mirrored_with_marker_and_recorded() {
        let f = fixture();
        let jira = jira();
        let linear = linear().with_comment("lin-1", "c-1", "Grace", "Looks good");

        let n = mirror_linear_to_jira(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 1);
        let writes = jira.writes();
        let JiraWrite::Comment { text, .. } = &writes[0] else {
            panic!("expected a comment write, got {writes:?}");
        };
        assert!(text.starts_with("<!-- trackbridge source:linear issue:lin-1 comment:c-1 -->"));
        assert!(f.store.is_comment_mirrored(Tracker::Linear, "c-1").unwrap());

        // The Jira copy is recorded, so the reverse direction leaves it alone.
        let n = mirror_jira_to_linear(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn jira_sourced_linear_comments_never_bounce_back() {
        let f = fixture();
        let jira = jira().with_comment("ABC-1", "10001", "Ada", "Hello");
        let linear = linear();

        mirror_jira_to_linear(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        let n = mirror_linear_to_jira(&jira, &linear, &f.store, &f.key, &f.id, false).unwrap();
        assert_eq!(n, 0);
        assert!(jira.writes().is_empty());
        assert!(matches!(
            linear.writes().as_slice(),
            [LinearWrite::Comment { .. }]
        ));
    }
}
