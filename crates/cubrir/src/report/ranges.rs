//! Compact missing-line ranges (`12-15, 42`)

use crate::unit::LineSet;

/// Group `missing` lines into inclusive ranges
///
/// Two missing lines join the same range when no executed line lies between
/// them; comments and blank lines in between do not break a range.
#[must_use]
pub fn missing_ranges(missing: &LineSet, executable: &LineSet) -> Vec<(u32, u32)> {
    let mut ranges = Vec::new();
    let mut current: Option<(u32, u32)> = None;

    for &line in executable {
        if missing.contains(&line) {
            current = Some(match current {
                Some((start, _)) => (start, line),
                None => (line, line),
            });
        } else if let Some(range) = current.take() {
            ranges.push(range);
        }
    }
    if let Some(range) = current {
        ranges.push(range);
    }
    ranges
}

/// Render ranges as `a-b, c`
#[must_use]
pub fn format_ranges(ranges: &[(u32, u32)]) -> String {
    ranges
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
