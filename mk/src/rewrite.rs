//! Single-line text transforms used by write-back
//!
//! These are pure functions over one line of source text (without its line
//! terminator). The sync engine decides which line to feed them.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::dates::{find_due_token, format_date};

/// Comment opener plus built-in keyword (group 1), optional colon, and spacing
static MARKER_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)((?://|#|<!--)\s*(?:TODO|FIXME|HACK|XXX|BUG|OPTIMIZE|REVIEW)\b)\s*:?\s*")
        .unwrap_or_else(|e| unreachable!("marker boundary pattern is invalid: {e}"))
});

/// Any built-in keyword as a whole word
static MARKER_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:TODO|FIXME|HACK|XXX|BUG|OPTIMIZE|REVIEW)\b")
        .unwrap_or_else(|e| unreachable!("marker word pattern is invalid: {e}"))
});

/// Keyword written over a finished marker
pub const DONE_MARKER: &str = "DONE";

/// Set the line's due date to `date`
///
/// An existing token is replaced in place, keeping its parentheses. Otherwise
/// `(@date): ` goes right after the marker keyword, replacing any colon there.
/// A line without a recognisable keyword gets ` @date` appended.
pub fn with_due_date(line: &str, date: NaiveDate) -> String {
    let date = format_date(date);

    if let Some(caps) = find_due_token(line, 0) {
        let Some(whole) = caps.get(0) else {
            return line.to_string();
        };
        let replacement = if caps.name("p").is_some() {
            format!("(@{})", date)
        } else {
            format!("@{}", date)
        };
        return format!("{}{}{}", &line[..whole.start()], replacement, &line[whole.end()..]);
    }

    if let Some(caps) = MARKER_BOUNDARY.captures(line)
        && let (Some(keyword), Some(whole)) = (caps.get(1), caps.get(0))
    {
        let prefix = &line[..keyword.end()];
        let rest = line[whole.end()..].trim();
        return format!("{}(@{}): {}", prefix, date, rest).trim_end().to_string();
    }

    format!("{} @{}", line.trim_end(), date)
}

/// Remove every due-date token and tidy the space around a following colon
///
/// `// TODO(@2024-03-01): fix parser` becomes `// TODO: fix parser`.
pub fn without_due_date(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pos = 0;

    while let Some(m) = find_due_token(line, pos).and_then(|caps| caps.get(0)) {
        out.push_str(&line[pos..m.start()]);
        let after = &line[m.end()..];
        let after_trimmed = after.trim_start();

        if let Some(tail) = after_trimmed.strip_prefix(':') {
            out.truncate(out.trim_end().len());
            out.push(':');
            let tail = tail.trim_start();
            if !tail.is_empty() {
                out.push(' ');
            }
            pos = line.len() - tail.len();
        } else if after_trimmed.is_empty() {
            out.truncate(out.trim_end().len());
            pos = line.len();
        } else if out.is_empty() || out.ends_with(char::is_whitespace) {
            pos = line.len() - after_trimmed.len();
        } else {
            pos = m.end();
        }
    }

    out.push_str(&line[pos..]);
    out
}

/// Replace every built-in marker keyword on the line with `DONE`
pub fn with_done_marker(line: &str) -> String {
    MARKER_WORD.replace_all(line, DONE_MARKER).into_owned()
}
