//! Allow-list file format.
//!
//! One identity per line. Blank lines and lines starting with `#` are
//! ignored, and anything after an inline `#` is dropped:
//!
//! ```text
//! # office
//! 10.0.0.1
//! 10.0.0.2   # build agent
//! ```

use std::collections::HashSet;

/// Parse the file contents into the set of allowed identities.
pub fn parse(content: &str) -> HashSet<String> {
    content.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let entry = match line.split_once('#') {
        Some((before, _)) => before.trim(),
        None => line,
    };
    (!entry.is_empty()).then(|| entry.to_string())
}
