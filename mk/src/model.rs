//! Detected comment types

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub use markstore::ItemStatus;

/// Kind of marker keyword that introduced a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarkerKind {
    Todo,
    Fixme,
    Hack,
    Xxx,
    Bug,
    Optimize,
    Review,
    /// Matched by a user-supplied pattern
    Custom,
}

impl MarkerKind {
    /// Built-in markers, in the order their default patterns are evaluated
    pub const BUILTIN: [MarkerKind; 7] = [
        Self::Todo,
        Self::Fixme,
        Self::Hack,
        Self::Xxx,
        Self::Bug,
        Self::Optimize,
        Self::Review,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::Fixme => "FIXME",
            Self::Hack => "HACK",
            Self::Xxx => "XXX",
            Self::Bug => "BUG",
            Self::Optimize => "OPTIMIZE",
            Self::Review => "REVIEW",
            Self::Custom => "CUSTOM",
        }
    }

    /// Priority implied by the marker kind
    pub fn priority(&self) -> Priority {
        match self {
            Self::Fixme | Self::Bug => Priority::High,
            Self::Optimize => Priority::Low,
            Self::Todo | Self::Hack | Self::Xxx | Self::Review | Self::Custom => Priority::Medium,
        }
    }
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

impl std::str::FromStr for MarkerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TODO" => Ok(Self::Todo),
            "FIXME" => Ok(Self::Fixme),
            "HACK" => Ok(Self::Hack),
            "XXX" => Ok(Self::Xxx),
            "BUG" => Ok(Self::Bug),
            "OPTIMIZE" => Ok(Self::Optimize),
            "REVIEW" => Ok(Self::Review),
            "CUSTOM" => Ok(Self::Custom),
            _ => Err(format!("Unknown marker: {}", s)),
        }
    }
}

/// Priority of a detected comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// A marker comment found by the most recent scan of its file
///
/// Rebuilt from scratch every time the file is scanned; the user-controlled
/// fields (`status`, `created_at`, `completed_at`) come from the metadata store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedItem {
    pub id: String,
    pub file_path: PathBuf,
    /// 0-based line number
    pub line_number: usize,
    #[serde(rename = "type")]
    pub kind: MarkerKind,
    /// Raw text matched by the pattern
    pub text: String,
    /// Comment text with any due-date token removed
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub due_date_raw: Option<String>,
    pub priority: Priority,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DetectedItem {
    pub fn is_open(&self) -> bool {
        self.status == ItemStatus::Open
    }
}
