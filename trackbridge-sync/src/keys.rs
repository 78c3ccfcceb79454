//! Jira issue-key extraction from free text and URLs.
//!
//! A key is an uppercase project prefix of 2-16 characters, a hyphen, and
//! 1-10 digits, delimited by ASCII word boundaries, so a key directly next
//! to a non-ASCII letter still matches. Matching is case-sensitive.

use regex::Regex;
use std::sync::LazyLock;

use trackbridge_core::IssueKey;

static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"(?-u:\b)([A-Z][A-Z0-9]{1,15}-[0-9]{1,10})(?-u:\b)") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });
static EXACT_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| match Regex::new(r"^[A-Z][A-Z0-9]{1,15}-[0-9]{1,10}$") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    });
static BROWSE_RE: LazyLock<Regex> =
    LazyLock::new(
        || match Regex::new(r"/browse/([A-Z][A-Z0-9]{1,15}-[0-9]{1,10})(?-u:\b)") {
            Ok(re) => re,
            Err(_) => unreachable!("static regex pattern"),
        },
    );
static QUERY_RE: LazyLock<Regex> = LazyLock::new(|| {
    match Regex::new(r"[?&](?:selectedIssue|issueKey)=([A-Z][A-Z0-9]{1,15}-[0-9]{1,10})(?-u:\b)") {
        Ok(re) => re,
        Err(_) => unreachable!("static regex pattern"),
    }
});

/// First key-shaped token in `text`.
pub fn extract_key_from_text(text: &str) -> Option<IssueKey> {
    first_capture(&KEY_RE, text)
}

/// Key named by a Jira URL: a `/browse/KEY` path segment, else a
/// `selectedIssue=` or `issueKey=` query parameter.
pub fn extract_key_from_url(url: &str) -> Option<IssueKey> {
    first_capture(&BROWSE_RE, url).or_else(|| first_capture(&QUERY_RE, url))
}

/// `true` when the whole of `s` is a well-formed key.
pub fn is_issue_key(s: &str) -> bool {
    EXACT_KEY_RE.is_match(s)
}

fn first_capture(re: &Regex, haystack: &str) -> Option<IssueKey> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| IssueKey::from(m.as_str()))
}
