//! `name: value` line format, parsed right to left.

use super::Fields;

/// Recover `name: value` fields from free-form text.
///
/// The last marker in `markers` is the anchor: its value is everything after
/// its last occurrence. Every other marker, walking backwards, takes the
/// first line after its last occurrence in the text that precedes all
/// markers found so far. Without the anchor nothing is recovered.
pub fn deconstruct(text: &str, markers: &[&str]) -> Fields {
    let mut fields = Fields::new();

    let Some((&anchor, others)) = markers.split_last() else {
        return fields;
    };
    let anchor_marker = format!("{}:", anchor);
    let Some(start) = text.rfind(&anchor_marker) else {
        return fields;
    };

    fields.insert(
        anchor.to_string(),
        text[start + anchor_marker.len()..].trim().to_string(),
    );

    let mut rest = &text[..start];
    for &name in others.iter().rev() {
        let marker = format!("{}:", name);
        if let Some(pos) = rest.rfind(&marker) {
            let value = rest[pos + marker.len()..]
                .trim()
                .lines()
                .next()
                .unwrap_or_default();
            fields.insert(name.to_string(), value.trim().to_string());
            rest = &rest[..pos];
        }
    }

    fields
}
