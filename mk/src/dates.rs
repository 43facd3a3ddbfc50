//! Due-date annotations inside comment text
//!
//! Recognised tokens, optionally wrapped in parentheses:
//!
//! ```text
//! @2024-03-01   @today   @tomorrow   @next-week   @next-month
//! ```
//!
//! Relative keywords resolve against the day the comment is scanned.

use std::sync::LazyLock;

use chrono::{Datelike, Days, Local, Months, NaiveDate};
use regex::{Captures, Regex};
use tracing::debug;

/// Matches a parenthesised or bare due-date token
///
/// Group `p` holds the value of a parenthesised token, group `b` a bare one.
/// Use [`find_due_token`], which also rejects a bare `@` glued to a word.
static DUE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\(@(?P<p>\d{4}-\d{2}-\d{2}|today|tomorrow|next-week|next-month)\)|@(?P<b>\d{4}-\d{2}-\d{2}|today|tomorrow|next-week|next-month)\b",
    )
    .unwrap_or_else(|e| unreachable!("due token pattern is invalid: {e}"))
});

/// A resolved due-date token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueToken {
    pub date: NaiveDate,
    /// Token text without `@` or parentheses, e.g. `2024-03-01` or `tomorrow`
    pub raw: String,
}

/// Today's date in local time
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Format a date the way tokens are written back into code
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Resolve a token value (absolute date or relative keyword) against `today`
pub fn resolve_token(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    match raw.to_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        "next-week" => today.checked_add_days(Days::new(7)),
        "next-month" => today.checked_add_months(Months::new(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok(),
    }
}

/// First due-date token in `text` starting at byte `start`
///
/// A bare token counts only when the `@` does not follow a word character,
/// so `bob@today.com` holds no token.
pub(crate) fn find_due_token(text: &str, start: usize) -> Option<Captures<'_>> {
    let mut at = start;
    while at <= text.len() {
        let caps = DUE_TOKEN.captures_at(text, at)?;
        let whole = caps.get(0)?;
        let glued = caps.name("b").is_some()
            && text[..whole.start()]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if !glued {
            return Some(caps);
        }
        at = whole.end();
    }
    None
}

fn token_value<'t>(caps: &Captures<'t>) -> Option<&'t str> {
    caps.name("p").or_else(|| caps.name("b")).map(|m| m.as_str())
}

/// Whether `text` contains any recognised token, valid date or not
pub fn has_due_token(text: &str) -> bool {
    find_due_token(text, 0).is_some()
}

/// Find and resolve the first due-date token in `text`
///
/// A token that does not resolve to a real date (e.g. `@2024-02-30`) counts as absent.
pub fn parse_due_token(text: &str, today: NaiveDate) -> Option<DueToken> {
    let caps = find_due_token(text, 0)?;
    let raw = token_value(&caps)?;
    let date = resolve_token(raw, today)?;
    Some(DueToken {
        date,
        raw: raw.to_string(),
    })
}

/// Remove the first due-date token and tidy what is left
///
/// `(@2024-03-01): fix parser` becomes `fix parser`.
pub fn strip_due_token(text: &str) -> String {
    let stripped = match find_due_token(text, 0).and_then(|caps| caps.get(0)) {
        Some(whole) => format!("{}{}", &text[..whole.start()], &text[whole.end()..]),
        None => text.to_string(),
    };
    let trimmed = stripped.trim();
    trimmed.strip_prefix(':').unwrap_or(trimmed).trim().to_string()
}

/// Split a matched description into its display text and resolved due date
pub fn extract_due_date(description: &str, today: NaiveDate) -> (String, Option<DueToken>) {
    match parse_due_token(description, today) {
        Some(token) => (strip_due_token(description), Some(token)),
        None => {
            if has_due_token(description) {
                debug!(%description, "extract_due_date: token does not resolve to a date, ignoring");
            }
            (description.trim().to_string(), None)
        }
    }
}

/// Last day (Sunday) of the ISO week containing `day`
pub fn end_of_iso_week(day: NaiveDate) -> NaiveDate {
    let remaining = 6 - day.weekday().num_days_from_monday();
    day.checked_add_days(Days::new(u64::from(remaining))).unwrap_or(day)
}
