//! Provenance markers embedded in mirrored comments and issue descriptions.
//!
//! Every comment the engine writes starts with a marker line such as
//! `<!-- trackbridge source:jira key:ABC-1 comment:10001 -->`. The engine
//! never mirrors a comment whose text carries the marker of the opposite
//! direction, which is what stops ping-pong between the trackers.

use trackbridge_core::Tracker;

pub const MARKER_PREFIX: &str = "<!-- trackbridge";

/// Build a marker line recording that the content came from `source`.
pub fn marker_line(source: Tracker, fields: &[(&str, &str)]) -> String {
    let mut line = format!("{MARKER_PREFIX} source:{}", source.as_str());
    for (key, value) in fields {
        line.push(' ');
        line.push_str(key);
        line.push(':');
        line.push_str(value);
    }
    line.push_str(" -->");
    line
}

/// `true` when `text` carries a marker written for content from `source`.
pub fn has_source_marker(text: &str, source: Tracker) -> bool {
    text.contains(&format!("{MARKER_PREFIX} source:{}", source.as_str()))
}

/// Needle for explicit links in Linear descriptions: `<!-- trackbridge jira:ABC-1 -->`.
pub fn description_link_needle() -> String {
    format!("{MARKER_PREFIX} jira:")
}
