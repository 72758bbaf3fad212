//! Stage timing records and their review printout.

use crate::ansi::{ARROW, GRAY, GREEN, MAGENTA, NORMAL, YELLOW};
use crate::codec::Fields;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// One timed record of pipeline execution.
///
/// The raw log holds an enter record (no fields) and a leave record per
/// stage, with `duration` 0. [`simplify`] folds each pair into one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,

    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,

    /// Milliseconds between enter and leave; 0 until paired.
    pub duration: i64,

    /// Notable outputs, present on leave records.
    pub fields: Fields,
}

impl Stage {
    pub fn enter(name: impl Into<String>, timestamp: i64) -> Self {
        Self {
            name: name.into(),
            timestamp,
            ..Default::default()
        }
    }

    pub fn leave(name: impl Into<String>, timestamp: i64, fields: Fields) -> Self {
        Self {
            name: name.into(),
            timestamp,
            duration: 0,
            fields,
        }
    }
}

/// Collapse each enter/leave pair into a single record.
///
/// The result keeps the leave record's name, timestamp, and fields, with
/// `duration = leave.timestamp - enter.timestamp`. An unpaired trailing
/// enter (a stage that failed midway) is dropped.
pub fn simplify(stages: &[Stage]) -> Vec<Stage> {
    stages
        .chunks_exact(2)
        .map(|pair| Stage {
            duration: pair[1].timestamp - pair[0].timestamp,
            ..pair[1].clone()
        })
        .collect()
}

/// Print simplified stages with their fields.
pub fn review<W: Write>(stages: &[Stage], out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}Pipeline review {}", MAGENTA, NORMAL)?;
    writeln!(out, "---------------")?;
    for (index, stage) in stages.iter().enumerate() {
        writeln!(
            out,
            "{}{} Stage #{} {}{} {}[{} ms]{}",
            GREEN,
            ARROW,
            index + 1,
            YELLOW,
            stage.name,
            GRAY,
            stage.duration,
            NORMAL
        )?;
        for (key, value) in &stage.fields {
            writeln!(out, "{}{}: {}{}", GRAY, key, NORMAL, value)?;
        }
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::fields;

    #[test]
    fn test_simplify_pairs() {
        let log = vec![
            Stage::enter("A", 0),
            Stage::leave("A", 5, fields([("topic", "geography")])),
            Stage::enter("B", 5),
            Stage::leave("B", 12, Fields::new()),
        ];
        let simple = simplify(&log);
        assert_eq!(simple.len(), 2);
        assert_eq!(simple[0].name, "A");
        assert_eq!(simple[0].duration, 5);
        assert_eq!(simple[0].fields["topic"], "geography");
        assert_eq!(simple[1].name, "B");
        assert_eq!(simple[1].duration, 7);
    }

    #[test]
    fn test_simplify_drops_unpaired_enter() {
        let log = vec![
            Stage::enter("Reason", 100),
            Stage::leave("Reason", 140, Fields::new()),
            Stage::enter("Respond", 140),
        ];
        let simple = simplify(&log);
        assert_eq!(simple.len(), 1);
        assert_eq!(simple[0].duration, 40);
        assert!(simplify(&[]).is_empty());
    }

    #[test]
    fn test_review_output() {
        let stages = vec![Stage {
            name: "Respond".into(),
            timestamp: 10,
            duration: 7,
            fields: fields([("answer", "Asphalt")]),
        }];
        let mut out = Vec::new();
        review(&stages, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Pipeline review"));
        assert!(text.contains("---------------\n"));
        assert!(text.contains("Stage #1 \x1b[93mRespond \x1b[90m[7 ms]"));
        assert!(text.contains("answer: \x1b[0mAsphalt\n"));
    }
}
