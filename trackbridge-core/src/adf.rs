//! Conversion between plain text and Jira's Atlassian Document Format.
//!
//! Only the subset needed for comment mirroring is produced: one `doc` with a
//! single `paragraph` of `text` and `hardBreak` nodes. Reading accepts any
//! document and keeps text leaves in document order.

use serde_json::{json, Value};

/// Flatten an ADF document to plain text.
///
/// `text` leaves are concatenated, each `hardBreak` becomes `\n`, and trailing
/// whitespace is trimmed from the result. Unknown node types contribute only
/// through their children.
pub fn adf_to_plain_text(adf: &Value) -> String {
    let mut out = String::new();
    walk(adf, &mut out);
    out.trim_end().to_string()
}

fn walk(node: &Value, out: &mut String) {
    match node {
        Value::Array(children) => {
            for child in children {
                walk(child, out);
            }
        }
        Value::Object(map) => {
            match map.get("type").and_then(Value::as_str) {
                Some("text") => {
                    if let Some(text) = map.get("text").and_then(Value::as_str) {
                        out.push_str(text);
                    }
                }
                Some("hardBreak") => out.push('\n'),
                _ => {}
            }
            if let Some(content) = map.get("content") {
                walk(content, out);
            }
        }
        _ => {}
    }
}

/// Build an ADF document from plain text.
///
/// Lines become `text` nodes (empty lines are omitted) separated by
/// `hardBreak` nodes, all inside one paragraph.
pub fn plain_text_to_adf(text: &str) -> Value {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut content = Vec::with_capacity(lines.len() * 2);
    for (i, line) in lines.iter().enumerate() {
        if !line.is_empty() {
            content.push(json!({ "type": "text", "text": line }));
        }
        if i + 1 < lines.len() {
            content.push(json!({ "type": "hardBreak" }));
        }
    }
    json!({
        "type": "doc",
        "version": 1,
        "content": [{ "type": "paragraph", "content": content }],
    })
}
