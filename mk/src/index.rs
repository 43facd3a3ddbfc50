//! In-memory index of detected items
//!
//! Owned by the [`Scanner`](crate::Scanner), which is its only writer.
//! All date classification happens at day granularity against a supplied `today`.

use std::collections::HashMap;
use std::path::Path;

use chrono::{Days, NaiveDate};

use crate::dates::end_of_iso_week;
use crate::model::{DetectedItem, ItemStatus};

#[derive(Debug, Default)]
pub struct ItemIndex {
    items: HashMap<String, DetectedItem>,
}

impl ItemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Insert or overwrite the item with the same id
    pub fn insert(&mut self, item: DetectedItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn get(&self, id: &str) -> Option<&DetectedItem> {
        self.items.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DetectedItem> {
        self.items.get_mut(id)
    }

    /// Drop every item that belongs to `path`, returning how many were removed
    pub fn remove_file(&mut self, path: &Path) -> usize {
        let before = self.items.len();
        self.items.retain(|_, item| item.file_path != path);
        before - self.items.len()
    }

    /// Every item, ordered by file and line
    pub fn all(&self) -> Vec<DetectedItem> {
        self.collect(|_| true)
    }

    /// Items that are not completed (open and snoozed)
    pub fn open(&self) -> Vec<DetectedItem> {
        self.collect(|item| item.status != ItemStatus::Completed)
    }

    pub fn completed(&self) -> Vec<DetectedItem> {
        self.collect(|item| item.status == ItemStatus::Completed)
    }

    /// Open items due strictly before `today`
    pub fn overdue(&self, today: NaiveDate) -> Vec<DetectedItem> {
        self.collect(|item| item.is_open() && item.due_date.is_some_and(|due| due < today))
    }

    /// Open items due on `today`
    pub fn due_today(&self, today: NaiveDate) -> Vec<DetectedItem> {
        self.collect(|item| item.is_open() && item.due_date == Some(today))
    }

    /// Open items due from tomorrow through the end of the ISO week
    pub fn due_this_week(&self, today: NaiveDate) -> Vec<DetectedItem> {
        let Some(tomorrow) = today.checked_add_days(Days::new(1)) else {
            return Vec::new();
        };
        let end = end_of_iso_week(today);
        self.collect(|item| item.is_open() && item.due_date.is_some_and(|due| due >= tomorrow && due <= end))
    }

    /// Open items with no due date
    pub fn no_due_date(&self) -> Vec<DetectedItem> {
        self.collect(|item| item.is_open() && item.due_date.is_none())
    }

    fn collect(&self, keep: impl Fn(&DetectedItem) -> bool) -> Vec<DetectedItem> {
        let mut items: Vec<DetectedItem> = self.items.values().filter(|item| keep(item)).cloned().collect();
        items.sort_by(|a, b| {
            a.file_path
                .cmp(&b.file_path)
                .then(a.line_number.cmp(&b.line_number))
                .then(a.id.cmp(&b.id))
        });
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MarkerKind, Priority};
    use chrono::Utc;
    use std::path::PathBuf;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn item(id: &str, file: &str, line: usize, due: Option<NaiveDate>, status: ItemStatus) -> DetectedItem {
        DetectedItem {
            id: id.to_string(),
            file_path: PathBuf::from(file),
            line_number: line,
            kind: MarkerKind::Todo,
            text: "// TODO: x".to_string(),
            description: "x".to_string(),
            due_date: due,
            due_date_raw: due.map(crate::dates::format_date),
            priority: Priority::Medium,
            status,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    fn ids(items: &[DetectedItem]) -> Vec<&str> {
        items.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_date_buckets() {
        // Wednesday
        let today = day(2024, 6, 5);
        let mut index = ItemIndex::new();
        index.insert(item("past", "a.rs", 0, Some(day(2024, 6, 4)), ItemStatus::Open));
        index.insert(item("now", "a.rs", 1, Some(today), ItemStatus::Open));
        index.insert(item("soon", "a.rs", 2, Some(day(2024, 6, 6)), ItemStatus::Open));
        index.insert(item("sunday", "a.rs", 3, Some(day(2024, 6, 9)), ItemStatus::Open));
        index.insert(item("later", "a.rs", 4, Some(day(2024, 6, 10)), ItemStatus::Open));
        index.insert(item("nodate", "a.rs", 5, None, ItemStatus::Open));
        index.insert(item("done", "a.rs", 6, Some(day(2024, 6, 1)), ItemStatus::Completed));
        index.insert(item("snoozed", "a.rs", 7, Some(day(2024, 6, 1)), ItemStatus::Snoozed));

        assert_eq!(ids(&index.overdue(today)), vec!["past"]);
        assert_eq!(ids(&index.due_today(today)), vec!["now"]);
        assert_eq!(ids(&index.due_this_week(today)), vec!["soon", "sunday"]);
        assert_eq!(ids(&index.no_due_date()), vec!["nodate"]);
        assert_eq!(ids(&index.completed()), vec!["done"]);
        assert_eq!(index.open().len(), 7);
        assert_eq!(index.all().len(), 8);
    }

    #[test]
    fn test_due_this_week_empty_on_sunday() {
        let sunday = day(2024, 6, 9);
        let mut index = ItemIndex::new();
        index.insert(item("monday", "a.rs", 0, Some(day(2024, 6, 10)), ItemStatus::Open));
        assert!(index.due_this_week(sunday).is_empty());
    }

    #[test]
    fn test_remove_file_only_touches_that_file() {
        let mut index = ItemIndex::new();
        index.insert(item("a0", "a.rs", 0, None, ItemStatus::Open));
        index.insert(item("a1", "a.rs", 1, None, ItemStatus::Open));
        index.insert(item("b0", "b.rs", 0, None, ItemStatus::Open));

        assert_eq!(index.remove_file(Path::new("a.rs")), 2);
        assert_eq!(ids(&index.all()), vec!["b0"]);
        assert_eq!(index.remove_file(Path::new("a.rs")), 0);
    }

    #[test]
    fn test_results_ordered_by_file_and_line() {
        let mut index = ItemIndex::new();
        index.insert(item("b3", "b.rs", 3, None, ItemStatus::Open));
        index.insert(item("a9", "a.rs", 9, None, ItemStatus::Open));
        index.insert(item("a2", "a.rs", 2, None, ItemStatus::Open));
        assert_eq!(ids(&index.all()), vec!["a2", "a9", "b3"]);
    }
}
