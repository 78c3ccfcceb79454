//! Key resolution: which Jira issue does a Linear issue correspond to?
//!
//! The identity store is consulted first and trusted without validation.
//! Otherwise the Linear issue is scanned by each [`Strategy`] in order, every
//! candidate is validated against Jira, and the first one that resolves is
//! persisted and returned.

use std::collections::HashSet;

use trackbridge_core::{
    IdentityStore, IssueKey, JiraApi, LinearApi, LinearIssueId, LinearIssueView, TrackerError,
};

use crate::error::SyncError;
use crate::keys::{extract_key_from_text, extract_key_from_url};
use crate::marker::description_link_needle;

/// A heuristic for finding Jira keys in a Linear issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// `<!-- trackbridge jira:ABC-1 -->` in the description.
    DescriptionMarker,
    /// Jira links attached to the issue.
    AttachmentUrl,
    /// Any key-shaped token in the title, then the description.
    FreeText,
}

/// Strategies in priority order.
pub const STRATEGIES: [Strategy; 3] = [
    Strategy::DescriptionMarker,
    Strategy::AttachmentUrl,
    Strategy::FreeText,
];

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::DescriptionMarker => "description-marker",
            Strategy::AttachmentUrl => "attachment-url",
            Strategy::FreeText => "free-text",
        }
    }

    /// Candidate keys this strategy finds in `issue`, in scan order.
    pub fn candidates(self, issue: &LinearIssueView) -> Vec<IssueKey> {
        match self {
            Strategy::DescriptionMarker => {
                let description = issue.description.as_deref().unwrap_or_default();
                description
                    .find(&description_link_needle())
                    .and_then(|idx| extract_key_from_text(&description[idx..]))
                    .into_iter()
                    .collect()
            }
            Strategy::AttachmentUrl => issue
                .attachments
                .iter()
                .filter_map(|a| a.url.as_deref())
                .filter_map(extract_key_from_url)
                .collect(),
            Strategy::FreeText => [
                Some(issue.title.as_str()),
                issue.description.as_deref(),
            ]
            .into_iter()
            .flatten()
            .filter_map(extract_key_from_text)
            .collect(),
        }
    }
}

/// How a Linear issue was (or was not) matched to a Jira key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Already linked in the identity store.
    Stored(IssueKey),
    /// Found by a strategy, validated, and now persisted.
    Discovered { key: IssueKey, strategy: Strategy },
    /// No strategy produced a key that resolves in Jira.
    Unmapped,
}

impl Resolution {
    pub fn key(&self) -> Option<&IssueKey> {
        match self {
            Resolution::Stored(key) | Resolution::Discovered { key, .. } => Some(key),
            Resolution::Unmapped => None,
        }
    }
}

/// Resolve the Jira key for Linear issue `id`.
///
/// Candidates that do not resolve in Jira are discarded; any other Jira
/// failure aborts the resolution.
pub fn resolve(
    jira: &dyn JiraApi,
    linear: &dyn LinearApi,
    store: &IdentityStore,
    id: &LinearIssueId,
) -> Result<Resolution, SyncError> {
    if let Some(key) = store.jira_key(id)? {
        tracing::debug!("{id}: linked to {key} in identity store");
        return Ok(Resolution::Stored(key));
    }

    let issue = linear.fetch_issue_sync_view(id)?;
    let Some((key, strategy)) = find_valid_candidate(jira, &issue)? else {
        return Ok(Resolution::Unmapped);
    };

    store.set_issue_pair(&key, id)?;
    tracing::info!("{id}: linked to {key} via {}", strategy.as_str());
    Ok(Resolution::Discovered { key, strategy })
}

fn find_valid_candidate(
    jira: &dyn JiraApi,
    issue: &LinearIssueView,
) -> Result<Option<(IssueKey, Strategy)>, TrackerError> {
    let mut rejected: HashSet<IssueKey> = HashSet::new();
    for strategy in STRATEGIES {
        for candidate in strategy.candidates(issue) {
            if rejected.contains(&candidate) {
                continue;
            }
            match jira.get_issue(&candidate) {
                Ok(_) => return Ok(Some((candidate, strategy))),
                Err(err) if err.is_unresolvable() => {
                    tracing::debug!(
                        "{}: candidate {candidate} from {} does not resolve: {err}",
                        issue.id,
                        strategy.as_str()
                    );
                    rejected.insert(candidate);
                }
                Err(err) => return Err(err),
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use trackbridge_core::fakes::{FakeIssue, FakeJira, FakeLinear};
    use trackbridge_core::types::LinearAttachment;
    use trackbridge_core::StatusCategory;

    fn view(title: &str, description: Option<&str>, urls: &[&str]) -> LinearIssueView {
        LinearIssueView {
            id: LinearIssueId::from("lin-1"),
            title: title.to_string(),
            description: description.map(str::to_string),
            url: None,
            team_id: "team-1".to_string(),
            state_name: "Todo".to_string(),
            attachments: urls
                .iter()
                .map(|u| LinearAttachment { url: Some(u.to_string()) })
                .collect(),
            comments: Vec::new(),
        }
    }

    fn keys(v: Vec<IssueKey>) -> Vec<String> {
        v.into_iter().map(|k| k.0).collect()
    }

    #[test]
    fn description_marker_reads_key_after_needle() {
        let issue = view(
            "Mentions OPS-1",
            Some("Context XYZ-9\n<!-- trackbridge jira:ABC-12 -->"),
            &[],
        );
        assert_eq!(keys(Strategy::DescriptionMarker.candidates(&issue)), ["ABC-12"]);
        assert!(Strategy::DescriptionMarker
            .candidates(&view("t", Some("no marker ABC-1"), &[]))
            .is_empty());
    }

    #[test]
    fn attachment_strategy_scans_every_url() {
        let issue = view(
            "t",
            None,
            &[
                "https://github.com/acme/x/pull/1",
                "https://acme.atlassian.net/browse/ABC-3",
                "https://acme.atlassian.net/issues/?selectedIssue=ABC-4",
            ],
        );
        assert_eq!(
            keys(Strategy::AttachmentUrl.candidates(&issue)),
            ["ABC-3", "ABC-4"]
        );
    }

    #[test]
    fn free_text_checks_title_before_description() {
        let issue = view("Fix OPS-5 crash", Some("Related to ABC-6"), &[]);
        assert_eq!(keys(Strategy::FreeText.candidates(&issue)), ["OPS-5", "ABC-6"]);
    }

    #[test]
    fn stored_link_is_trusted_without_remote_calls() {
        let tmp = TempDir::new().unwrap();
        let store = IdentityStore::open_at(tmp.path());
        store
            .set_issue_pair(&IssueKey::from("GONE-1"), &LinearIssueId::from("lin-1"))
            .unwrap();
        let jira = FakeJira::new();
        let linear = FakeLinear::new();

        let resolution = resolve(&jira, &linear, &store, &LinearIssueId::from("lin-1")).unwrap();
        assert_eq!(resolution, Resolution::Stored(IssueKey::from("GONE-1")));
        assert_eq!(jira.get_issue_calls(), 0);
    }

    #[test]
    fn invalid_earlier_candidate_falls_through_to_later_strategy() {
        let tmp = TempDir::new().unwrap();
        let store = IdentityStore::open_at(tmp.path());
        let jira = FakeJira::new().with_issue("ABC-2", "To Do", StatusCategory::New);
        let linear = FakeLinear::new().with_issue(
            "proj",
            FakeIssue::new("lin-1", "Follow-up for ABC-2", "Todo")
                .description("<!-- trackbridge jira:NOPE-1 -->")
                .attachment("https://acme.atlassian.net/browse/NOPE-1"),
        );

        let resolution = resolve(&jira, &linear, &store, &LinearIssueId::from("lin-1")).unwrap();
        assert_eq!(
            resolution,
            Resolution::Discovered {
                key: IssueKey::from("ABC-2"),
                strategy: Strategy::FreeText,
            }
        );
        // NOPE-1 is validated once even though two strategies produced it.
        assert_eq!(jira.get_issue_calls(), 2);
        assert_eq!(
            store.jira_key(&LinearIssueId::from("lin-1")).unwrap(),
            Some(IssueKey::from("ABC-2"))
        );
    }

    #[test]
    fn exhausted_candidates_are_unmapped_and_not_persisted() {
        let tmp = TempDir::new().unwrap();
        let store = IdentityStore::open_at(tmp.path());
        let jira = FakeJira::new();
        let linear = FakeLinear::new()
            .with_issue("proj", FakeIssue::new("lin-1", "abc-1 is lowercase", "Todo"));

        let resolution = resolve(&jira, &linear, &store, &LinearIssueId::from("lin-1")).unwrap();
        assert_eq!(resolution, Resolution::Unmapped);
        assert!(store.load().unwrap().issue_pairs().is_empty());
    }

    #[test]
    fn transport_failure_during_validation_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let store = IdentityStore::open_at(tmp.path());
        let jira = FakeJira::new().with_issue("ABC-1", "To Do", StatusCategory::New);
        jira.fail_on("get_issue");
        let linear =
            FakeLinear::new().with_issue("proj", FakeIssue::new("lin-1", "ABC-1", "Todo"));

        let err = resolve(&jira, &linear, &store, &LinearIssueId::from("lin-1")).unwrap_err();
        assert!(matches!(err, SyncError::Tracker(TrackerError::Transport { .. })));
    }
}
