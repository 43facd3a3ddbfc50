//! Sync engine - writes structured changes back into comment text
//!
//! Every operation edits exactly one line, guarded by the text the scanner
//! last saw there. A successful edit is saved and the file is rescanned so the
//! index is re-derived from the new text. Failures are logged and surfaced
//! through [`Documents::show_error`]; they never escape as errors.

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::document::{Documents, LineEdit};
use crate::error::SyncError;
use crate::model::DetectedItem;
use crate::rewrite;
use crate::scanner::Scanner;

/// What to do once an edit has been applied and saved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterSave {
    /// Rescan the file
    Rescan,
    /// Mark the item complete without rescanning
    Complete,
}

/// Translates mutation requests into guarded single-line edits
pub struct SyncEngine<D: Documents> {
    documents: D,
}

impl<D: Documents> SyncEngine<D> {
    pub fn new(documents: D) -> Self {
        Self { documents }
    }

    pub fn documents(&self) -> &D {
        &self.documents
    }

    /// Write `(@date)` into the item's comment, replacing any existing date
    pub async fn set_due_date(&self, scanner: &mut Scanner, item: &DetectedItem, date: NaiveDate) -> bool {
        debug!(id = %item.id, %date, "SyncEngine::set_due_date: called");
        let result = self
            .edit_line(scanner, item, AfterSave::Rescan, |line| {
                replace(item, line, rewrite::with_due_date(line, date))
            })
            .await;
        self.finish("add reminder", item, result)
    }

    /// [`SyncEngine::set_due_date`] for an item looked up by id
    pub async fn set_due_date_by_id(&self, scanner: &mut Scanner, id: &str, date: NaiveDate) -> bool {
        match scanner.get(id).cloned() {
            Some(item) => self.set_due_date(scanner, &item, date).await,
            None => {
                self.report("add reminder", SyncError::UnknownItem(id.to_string()));
                false
            }
        }
    }

    /// Strip any due-date token from the item's comment
    pub async fn clear_due_date(&self, scanner: &mut Scanner, item: &DetectedItem) -> bool {
        debug!(id = %item.id, "SyncEngine::clear_due_date: called");
        let result = self
            .edit_line(scanner, item, AfterSave::Rescan, |line| {
                replace(item, line, rewrite::without_due_date(line))
            })
            .await;
        self.finish("remove reminder", item, result)
    }

    /// Rewrite the marker keyword to DONE and mark the item complete
    pub async fn mark_done(&self, scanner: &mut Scanner, item: &DetectedItem) -> bool {
        debug!(id = %item.id, "SyncEngine::mark_done: called");
        let result = self
            .edit_line(scanner, item, AfterSave::Complete, |line| {
                replace(item, line, rewrite::with_done_marker(line))
            })
            .await;
        self.finish("mark as done", item, result)
    }

    /// Delete the item's whole line, then rescan the file
    ///
    /// Destructive: nothing happens unless `confirmed` is true.
    pub async fn delete_line(&self, scanner: &mut Scanner, item: &DetectedItem, confirmed: bool) -> bool {
        debug!(id = %item.id, confirmed, "SyncEngine::delete_line: called");
        if !confirmed {
            info!(id = %item.id, "Delete not confirmed, leaving line in place");
            return false;
        }

        let result = self
            .edit_line(scanner, item, AfterSave::Rescan, |line| LineEdit::Delete {
                path: item.file_path.clone(),
                line: item.line_number,
                expected: line.to_string(),
            })
            .await;
        self.finish("delete comment", item, result)
    }

    /// Show the item's line without changing anything
    pub async fn navigate(&self, item: &DetectedItem) -> bool {
        debug!(id = %item.id, "SyncEngine::navigate: called");
        match self.documents.reveal(&item.file_path, item.line_number).await {
            Ok(()) => true,
            Err(e) => {
                error!(path = %item.file_path.display(), error = %e, "Error navigating to comment");
                self.documents
                    .show_error(&format!("Failed to open file: {}", item.file_path.display()));
                false
            }
        }
    }

    /// Build an edit from the item's current line, apply, save, then reconcile
    ///
    /// The line must still hold the marker text seen at scan time. Nothing is
    /// saved or rescanned when it does not, or when the document rejects the edit.
    async fn edit_line(
        &self,
        scanner: &mut Scanner,
        item: &DetectedItem,
        after: AfterSave,
        build: impl FnOnce(&str) -> LineEdit,
    ) -> Result<bool, SyncError> {
        let document = self.documents.open(&item.file_path).await?;
        let line = document.line(item.line_number)?;
        if !line.contains(item.text.as_str()) {
            debug!(id = %item.id, %line, "SyncEngine::edit_line: marker no longer on line");
            return Ok(false);
        }
        let edit = build(line);

        if !self.documents.apply(edit).await? {
            return Ok(false);
        }
        self.documents.save(&item.file_path).await?;

        match after {
            AfterSave::Rescan => {
                scanner.scan_file(&item.file_path, true).await;
            }
            AfterSave::Complete => scanner.mark_complete(&item.id)?,
        }
        Ok(true)
    }

    fn finish(&self, action: &str, item: &DetectedItem, result: Result<bool, SyncError>) -> bool {
        match result {
            Ok(true) => {
                info!(id = %item.id, path = %item.file_path.display(), line = item.line_number, "Comment updated: {}", action);
                true
            }
            Ok(false) => {
                warn!(id = %item.id, path = %item.file_path.display(), "Edit not applied: {}", action);
                self.documents
                    .show_error(&format!("Failed to {}: the line has changed since the last scan", action));
                false
            }
            Err(e) => {
                self.report(action, e);
                false
            }
        }
    }

    fn report(&self, action: &str, err: SyncError) {
        error!(error = %err, "Error trying to {}", action);
        self.documents.show_error(&format!("Failed to {}: {}", action, err));
    }
}

fn replace(item: &DetectedItem, line: &str, new_text: String) -> LineEdit {
    LineEdit::Replace {
        path: item.file_path.clone(),
        line: item.line_number,
        expected: line.to_string(),
        new_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScannerConfig;
    use crate::document::{Document, FsDocuments};
    use crate::error::DocumentError;
    use crate::events::EventBus;
    use crate::identity::item_id;
    use crate::model::ItemStatus;
    use async_trait::async_trait;
    use markstore::MetaStore;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        path: PathBuf,
        scanner: Scanner,
    }

    async fn fixture(content: &str) -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("ws");
        fs::create_dir_all(&root).unwrap();
        let path = root.join("lib.rs");
        fs::write(&path, content).unwrap();
        let meta = MetaStore::open(temp.path().join("state.json")).unwrap();
        let mut scanner = Scanner::new(ScannerConfig::default(), vec![root], meta, EventBus::default());
        scanner.scan_workspace().await;
        Fixture {
            _temp: temp,
            path,
            scanner,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_clear_due_date() {
        let mut fx = fixture("fn a() {}\n\n\n\n\n// TODO: fix parser\n").await;
        let engine = SyncEngine::new(FsDocuments::new());
        let item = fx.scanner.get(&item_id(&fx.path, 5)).cloned().unwrap();

        assert!(engine.set_due_date(&mut fx.scanner, &item, day(2024, 3, 1)).await);
        let text = fs::read_to_string(&fx.path).unwrap();
        assert_eq!(text.lines().nth(5), Some("// TODO(@2024-03-01): fix parser"));

        let rescanned = fx.scanner.get(&item.id).cloned().unwrap();
        assert_eq!(rescanned.due_date, Some(day(2024, 3, 1)));
        assert_eq!(rescanned.due_date_raw.as_deref(), Some("2024-03-01"));
        assert_eq!(rescanned.description, "fix parser");

        assert!(engine.clear_due_date(&mut fx.scanner, &rescanned).await);
        let cleared = fx.scanner.get(&item.id).cloned().unwrap();
        assert!(cleared.due_date.is_none());
        assert_eq!(
            fs::read_to_string(&fx.path).unwrap().lines().nth(5),
            Some("// TODO: fix parser")
        );
    }

    #[tokio::test]
    async fn test_set_due_date_by_unknown_id() {
        let mut fx = fixture("// TODO: a\n").await;
        let engine = SyncEngine::new(FsDocuments::new());
        assert!(!engine.set_due_date_by_id(&mut fx.scanner, "ffffffffffff", day(2024, 3, 1)).await);
    }

    #[tokio::test]
    async fn test_mark_done_rewrites_and_completes() {
        let mut fx = fixture("// TODO: fix parser\n").await;
        let engine = SyncEngine::new(FsDocuments::new());
        let item = fx.scanner.get(&item_id(&fx.path, 0)).cloned().unwrap();

        assert!(engine.mark_done(&mut fx.scanner, &item).await);
        assert_eq!(fs::read_to_string(&fx.path).unwrap(), "// DONE: fix parser\n");
        assert_eq!(fx.scanner.get(&item.id).unwrap().status, ItemStatus::Completed);
        assert_eq!(fx.scanner.meta().get(&item.id).unwrap().status, ItemStatus::Completed);
    }

    #[tokio::test]
    async fn test_delete_requires_confirmation() {
        let mut fx = fixture("// TODO: one\n").await;
        let engine = SyncEngine::new(FsDocuments::new());
        let item = fx.scanner.get(&item_id(&fx.path, 0)).cloned().unwrap();

        assert!(!engine.delete_line(&mut fx.scanner, &item, false).await);
        assert_eq!(fs::read_to_string(&fx.path).unwrap(), "// TODO: one\n");
    }

    #[tokio::test]
    async fn test_delete_shifts_later_identities() {
        let mut fx = fixture("// TODO: one\nlet a = 1;\n// FIXME: two\n").await;
        let engine = SyncEngine::new(FsDocuments::new());
        let first = fx.scanner.get(&item_id(&fx.path, 0)).cloned().unwrap();
        let old_second_id = item_id(&fx.path, 2);

        assert!(engine.delete_line(&mut fx.scanner, &first, true).await);
        assert_eq!(fs::read_to_string(&fx.path).unwrap(), "let a = 1;\n// FIXME: two\n");

        let open = fx.scanner.open_items();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].line_number, 1);
        assert_eq!(open[0].id, item_id(&fx.path, 1));
        assert!(open.iter().all(|i| i.id != first.id && i.id != old_second_id));
    }

    #[tokio::test]
    async fn test_stale_item_is_not_written() {
        let mut fx = fixture("// TODO: one\n").await;
        let engine = SyncEngine::new(FsDocuments::new());
        let item = fx.scanner.get(&item_id(&fx.path, 0)).cloned().unwrap();

        fs::write(&fx.path, "// TODO: edited elsewhere\n").unwrap();
        assert!(!engine.mark_done(&mut fx.scanner, &item).await);
        assert_eq!(fs::read_to_string(&fx.path).unwrap(), "// TODO: edited elsewhere\n");
        assert_eq!(fx.scanner.get(&item.id).unwrap().status, ItemStatus::Open);
    }

    /// Records calls and rejects every edit
    #[derive(Default)]
    struct RejectingDocuments {
        saves: Mutex<usize>,
        errors: Mutex<Vec<String>>,
        revealed: Mutex<Vec<(PathBuf, usize)>>,
    }

    #[async_trait]
    impl Documents for RejectingDocuments {
        async fn open(&self, path: &Path) -> Result<Document, DocumentError> {
            Ok(Document::new(path, fs::read_to_string(path).unwrap_or_default()))
        }

        async fn apply(&self, _edit: LineEdit) -> Result<bool, DocumentError> {
            Ok(false)
        }

        async fn save(&self, _path: &Path) -> Result<(), DocumentError> {
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }

        async fn reveal(&self, path: &Path, line: usize) -> Result<(), DocumentError> {
            self.revealed.lock().unwrap().push((path.to_path_buf(), line));
            Ok(())
        }

        fn show_error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    #[tokio::test]
    async fn test_rejected_edit_skips_save_and_reports() {
        let mut fx = fixture("// TODO: one\n").await;
        let engine = SyncEngine::new(RejectingDocuments::default());
        let item = fx.scanner.get(&item_id(&fx.path, 0)).cloned().unwrap();

        assert!(!engine.set_due_date(&mut fx.scanner, &item, day(2024, 3, 1)).await);
        assert_eq!(*engine.documents().saves.lock().unwrap(), 0);
        assert_eq!(engine.documents().errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_navigate_does_not_mutate() {
        let fx = fixture("// TODO: one\n").await;
        let engine = SyncEngine::new(RejectingDocuments::default());
        let item = fx.scanner.get(&item_id(&fx.path, 0)).cloned().unwrap();

        assert!(engine.navigate(&item).await);
        assert_eq!(
            engine.documents().revealed.lock().unwrap().as_slice(),
            &[(fx.path.clone(), 0)]
        );
        assert_eq!(fs::read_to_string(&fx.path).unwrap(), "// TODO: one\n");
        assert_eq!(fx.scanner.all_items().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_line_is_reported() {
        let mut fx = fixture("// TODO: one\n").await;
        let engine = SyncEngine::new(FsDocuments::new());
        let mut item = fx.scanner.get(&item_id(&fx.path, 0)).cloned().unwrap();
        item.line_number = 50;

        assert!(!engine.clear_due_date(&mut fx.scanner, &item).await);
    }
}
