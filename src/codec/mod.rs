//! Structured completions: named fields to prompt text and back.
//!
//! Two renderings share one field set:
//!
//! | Mode | [`construct`] | [`breakdown`] |
//! |------|---------------|---------------|
//! | line | `name: value` per known field, fixed order | right-to-left scan ([`deconstruct`]) |
//! | JSON | indented object | [`un_json`] with truncation repair, else line scan |
//!
//! Parsing never fails; a field the model never wrote is simply absent.

pub mod lines;
pub mod repair;

pub use lines::deconstruct;
pub use repair::un_json;

use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Field name to value.
pub type Fields = BTreeMap<String, String>;

/// Fields in the order they are rendered and expected back.
///
/// The last one is the anchor of the right-to-left scan.
pub const KNOWN_FIELDS: [&str; 7] = [
    "inquiry",
    "tool",
    "thought",
    "keyphrases",
    "observation",
    "answer",
    "topic",
];

/// Appended when a completion carries no topic, so the scan always anchors.
pub const FALLBACK_TOPIC: &str = "topic: general knowledge.";

/// Build [`Fields`] from literal pairs.
pub fn fields<const N: usize>(pairs: [(&str, &str); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Render fields for a prompt.
///
/// JSON mode emits an indented object. Line mode emits one `name: value`
/// line per non-empty known field in [`KNOWN_FIELDS`] order; unknown names
/// are not rendered.
pub fn construct(fields: &Fields, json: bool) -> String {
    if json {
        let object: Map<String, Value> = fields
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        return format!("{:#}", Value::Object(object));
    }

    KNOWN_FIELDS
        .iter()
        .filter_map(|&name| {
            fields
                .get(name)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}: {}", name, v))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Recover fields from `hint` followed by the model's `completion`.
///
/// Text starting with `{` is tried as (possibly truncated) JSON first. The
/// line scan runs otherwise, and is repeated with [`FALLBACK_TOPIC`]
/// appended when it finds no topic.
pub fn breakdown(hint: &str, completion: &str) -> Fields {
    let text = format!("{}{}", hint, completion);

    if text.starts_with('{') {
        if let Some(fields) = un_json(&text) {
            return fields;
        }
        tracing::debug!(text = %text.replace('\n', ""), "completion is not JSON, scanning lines");
    }

    let fields = deconstruct(&text, &KNOWN_FIELDS);
    if fields.get("topic").is_some_and(|t| !t.is_empty()) {
        return fields;
    }

    deconstruct(&format!("{}\n{}", text, FALLBACK_TOPIC), &KNOWN_FIELDS)
}

/// Titled block describing `fields`, for a system prompt.
pub fn structure(prefix: &str, fields: &Fields, json: bool) -> String {
    if json {
        format!("{} (JSON with this schema)\n{}\n", prefix, construct(fields, true))
    } else {
        format!("{}\n\n{}\n", prefix, construct(fields, false))
    }
}
