//! Recovery of JSON completions cut off by the token limit.

use super::Fields;
use serde_json::Value;

/// Closers tried, in order, after the text as-is.
const CLOSERS: [&str; 2] = ["}", "\"}"];

/// Parse a JSON object completion, closing it first if it was truncated.
///
/// Three passes: the text as-is, then with `}` appended, then with `"}`
/// appended; the first that yields an object wins. String values are kept
/// verbatim, `null` becomes empty, and any other value keeps its JSON text.
pub fn un_json(text: &str) -> Option<Fields> {
    std::iter::once(String::new())
        .chain(CLOSERS.iter().map(|c| c.to_string()))
        .find_map(|closer| {
            let candidate = format!("{}{}", text, closer);
            match serde_json::from_str::<Value>(&candidate) {
                Ok(Value::Object(map)) => Some(
                    map.into_iter()
                        .map(|(key, value)| (key, flatten(value)))
                        .collect(),
                ),
                _ => None,
            }
        })
}

fn flatten(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
