//! Terminal escape codes and symbols used in reports.

pub const NORMAL: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const YELLOW: &str = "\x1b[93m";
pub const MAGENTA: &str = "\x1b[35m";
pub const RED: &str = "\x1b[91m";
pub const GREEN: &str = "\x1b[92m";
pub const CYAN: &str = "\x1b[36m";
pub const GRAY: &str = "\x1b[90m";

pub const ARROW: &str = "⇢";
pub const CHECK: &str = "✓";
pub const CROSS: &str = "✘";
