//! Scanner - finds marker comments and reconciles them with stored metadata
//!
//! Every scan of a file drops that file's items and re-derives them from the
//! current text. Identity is positional (see [`crate::identity`]), and the
//! user-controlled status of each identity comes from the [`MetaStore`].
//!
//! # Workspace scans
//!
//! ```text
//! discover (walkdir + include/exclude globs, capped at max-files)
//!     │
//!     ▼
//! ┌─ batch 1 ─┐   ┌─ batch 2 ─┐   ┌─ batch 3 ─┐
//! │ read+match│ → │ read+match│ → │ read+match│     batches run in order,
//! │ x20 concur│   │ x20 concur│   │ x5  concur│     files within a batch concurrently
//! └─────┬─────┘   └─────┬─────┘   └─────┬─────┘
//!       └── merge into index (single writer) ──┘
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use futures::future::join_all;
use markstore::MetaStore;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::config::ScannerConfig;
use crate::dates::{self, extract_due_date};
use crate::error::ScanError;
use crate::events::{EventBus, ScanEvent};
use crate::identity::item_id;
use crate::index::ItemIndex;
use crate::model::{DetectedItem, ItemStatus};
use crate::patterns::{LineMatch, PatternSet};

/// Pattern hits for one file, before reconciliation
#[derive(Debug)]
struct FileMatches {
    path: PathBuf,
    matches: Vec<(usize, LineMatch)>,
}

/// Read `path` and evaluate every line against `patterns`
///
/// Bytes that are not valid UTF-8 are decoded lossily so markers in legacy
/// encodings are still found.
async fn extract_file(path: &Path, patterns: &PatternSet) -> std::io::Result<FileMatches> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8_lossy(&bytes);
    let matches = text
        .lines()
        .enumerate()
        .flat_map(|(line_number, line)| {
            patterns
                .match_line(line)
                .into_iter()
                .map(move |m| (line_number, m))
        })
        .collect();
    Ok(FileMatches {
        path: path.to_path_buf(),
        matches,
    })
}

const GLOB_OPTIONS: glob::MatchOptions = glob::MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Directory globs implied by excludes ending in `/**`
///
/// `**/node_modules/**` yields `**/node_modules`, which lets discovery skip the
/// directory instead of filtering every file under it.
fn compile_dir_globs(sources: &[String]) -> Vec<glob::Pattern> {
    let dirs: Vec<String> = sources
        .iter()
        .filter_map(|source| source.strip_suffix("/**"))
        .filter(|dir| !dir.is_empty())
        .map(str::to_string)
        .collect();
    compile_globs(&dirs)
}

fn compile_globs(sources: &[String]) -> Vec<glob::Pattern> {
    sources
        .iter()
        .filter_map(|source| match glob::Pattern::new(source) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(pattern = %source, error = %e, "Invalid glob pattern, skipping");
                None
            }
        })
        .collect()
}

/// Owns the in-memory item index and keeps it reconciled with source files
pub struct Scanner {
    config: ScannerConfig,
    roots: Vec<PathBuf>,
    patterns: PatternSet,
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
    exclude_dirs: Vec<glob::Pattern>,
    index: ItemIndex,
    meta: MetaStore,
    events: EventBus,
    last_batches: Vec<usize>,
}

impl Scanner {
    /// Create a scanner over `roots`, overlaying status from `meta`
    pub fn new(config: ScannerConfig, roots: Vec<PathBuf>, meta: MetaStore, events: EventBus) -> Self {
        debug!(roots = ?roots, custom = config.custom_patterns.len(), "Scanner::new: called");
        Self {
            patterns: PatternSet::new(&config.custom_patterns),
            include: compile_globs(&config.include_patterns),
            exclude: compile_globs(&config.exclude_patterns),
            exclude_dirs: compile_dir_globs(&config.exclude_patterns),
            config,
            roots,
            index: ItemIndex::new(),
            meta,
            events,
            last_batches: Vec::new(),
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn meta(&self) -> &MetaStore {
        &self.meta
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    /// Sizes of the batches processed by the last workspace scan
    pub fn last_batch_sizes(&self) -> &[usize] {
        &self.last_batches
    }

    /// Replace the configuration and recompile patterns and globs
    ///
    /// Does not rescan; callers decide when the new patterns take effect.
    pub fn reload_config(&mut self, config: ScannerConfig) {
        info!(custom = config.custom_patterns.len(), "Reloading scanner configuration");
        self.patterns.rebuild(&config.custom_patterns);
        self.include = compile_globs(&config.include_patterns);
        self.exclude = compile_globs(&config.exclude_patterns);
        self.exclude_dirs = compile_dir_globs(&config.exclude_patterns);
        self.config = config;
    }

    /// Whether `path` passes the exclude and include globs
    ///
    /// Globs are matched case-insensitively against the path relative to the
    /// workspace root that contains it. Excludes win over includes.
    pub fn should_scan(&self, path: &Path) -> bool {
        let relative = self.relative(path);

        if self.exclude.iter().any(|p| p.matches_path_with(relative, GLOB_OPTIONS)) {
            return false;
        }
        self.include.iter().any(|p| p.matches_path_with(relative, GLOB_OPTIONS))
    }

    /// Whether the walk should skip everything below directory `path`
    fn is_excluded_dir(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        self.exclude_dirs
            .iter()
            .chain(&self.exclude)
            .any(|p| p.matches_path_with(relative, GLOB_OPTIONS))
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
    }

    /// Enumerate scannable files under every root, up to `max_files`
    pub fn discover_files(&self) -> Result<Vec<PathBuf>, ScanError> {
        let mut files = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                return Err(ScanError::RootNotFound { path: root.clone() });
            }

            let walker = WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| {
                    entry.depth() == 0 || !entry.file_type().is_dir() || !self.is_excluded_dir(entry.path())
                });

            for entry in walker {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.depth() == 0 => {
                        return Err(ScanError::Walk {
                            path: root.clone(),
                            source: e,
                        });
                    }
                    Err(e) => {
                        debug!(error = %e, "Scanner::discover_files: skipping unreadable entry");
                        continue;
                    }
                };

                if entry.file_type().is_file() && self.should_scan(entry.path()) {
                    files.push(entry.into_path());
                    if files.len() >= self.config.max_files {
                        info!(max_files = self.config.max_files, "File discovery limit reached");
                        return Ok(files);
                    }
                }
            }
        }

        debug!(count = files.len(), "Scanner::discover_files: done");
        Ok(files)
    }

    /// Rescan every workspace file from scratch
    ///
    /// Always finishes with exactly one `ScanCompleted` event, with count 0 when
    /// there are no roots or discovery fails.
    pub async fn scan_workspace(&mut self) -> Vec<DetectedItem> {
        info!(roots = self.roots.len(), "Workspace scan started");
        self.events.emit(ScanEvent::ScanStarted);
        self.index.clear();
        self.last_batches.clear();

        if self.roots.is_empty() {
            info!("No workspace roots, nothing to scan");
            self.events.emit(ScanEvent::ScanCompleted { count: 0 });
            return Vec::new();
        }

        let files = match self.discover_files() {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "Error scanning workspace");
                self.events.emit(ScanEvent::ScanCompleted { count: 0 });
                return Vec::new();
            }
        };

        let batch_size = self.config.batch_size.max(1);
        let today = dates::today();
        let mut created = 0usize;

        for batch in files.chunks(batch_size) {
            debug!(size = batch.len(), "Scanner::scan_workspace: batch");
            self.last_batches.push(batch.len());

            let results = join_all(batch.iter().map(|path| extract_file(path, &self.patterns))).await;

            for (path, result) in batch.iter().zip(results) {
                match result {
                    Ok(file) => {
                        let (_, new_records) = self.reconcile(file, today, Utc::now());
                        created += new_records;
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Error scanning file"),
                }
            }
        }

        if created > 0
            && let Err(e) = self.meta.flush()
        {
            error!(error = %e, "Failed to persist metadata after workspace scan");
        }

        let count = self.index.len();
        info!(files = files.len(), count, batches = self.last_batches.len(), "Workspace scan completed");
        self.events.emit(ScanEvent::ItemsChanged {
            items: self.index.open(),
        });
        self.events.emit(ScanEvent::ScanCompleted { count });
        self.index.open()
    }

    /// Rescan one file, replacing its items in the index
    ///
    /// An unreadable file logs a warning and yields no items; its previous
    /// items stay in the index.
    pub async fn scan_file(&mut self, path: &Path, emit_event: bool) -> Vec<DetectedItem> {
        debug!(path = %path.display(), emit_event, "Scanner::scan_file: called");
        let file = match extract_file(path, &self.patterns).await {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Error scanning file");
                return Vec::new();
            }
        };

        let removed = self.index.remove_file(path);
        let (items, created) = self.reconcile(file, dates::today(), Utc::now());

        if emit_event {
            if created > 0
                && let Err(e) = self.meta.flush()
            {
                error!(path = %path.display(), error = %e, "Failed to persist metadata");
            }
            if !items.is_empty() || removed > 0 {
                self.events.emit(ScanEvent::ItemsChanged {
                    items: self.index.open(),
                });
            }
        }

        items
    }

    /// Build items for one file's matches and insert them
    ///
    /// The caller has already dropped the file's previous items.
    ///
    /// Returns the items plus how many metadata records were created.
    fn reconcile(&mut self, file: FileMatches, today: NaiveDate, now: DateTime<Utc>) -> (Vec<DetectedItem>, usize) {
        let mut items = Vec::with_capacity(file.matches.len());
        let mut created = 0;

        for (line_number, m) in file.matches {
            let id = item_id(&file.path, line_number);
            let (meta, is_new) = self.meta.get_or_create_open(&id, now);
            if is_new {
                created += 1;
            }

            let (description, due) = extract_due_date(&m.description, today);
            let item = DetectedItem {
                id,
                file_path: file.path.clone(),
                line_number,
                kind: m.kind,
                text: m.text,
                description,
                due_date: due.as_ref().map(|d| d.date),
                due_date_raw: due.map(|d| d.raw),
                priority: m.kind.priority(),
                status: meta.status,
                created_at: meta.created_at,
                completed_at: meta.completed_at,
            };

            // Two markers on one line share an id; the later pattern wins in the index
            self.index.insert(item.clone());
            items.push(item);
        }

        debug!(path = %file.path.display(), count = items.len(), created, "Scanner::reconcile: done");
        (items, created)
    }

    /// Drop the items of a deleted file
    pub fn remove_file(&mut self, path: &Path) {
        let removed = self.index.remove_file(path);
        debug!(path = %path.display(), removed, "Scanner::remove_file: called");
        if removed > 0 {
            self.events.emit(ScanEvent::ItemsChanged {
                items: self.index.open(),
            });
        }
    }

    /// React to a saved file: rescan it when scan-on-save applies
    ///
    /// Returns `None` when the file was not rescanned.
    pub async fn handle_saved(&mut self, path: &Path) -> Option<Vec<DetectedItem>> {
        if !self.config.scan_on_save || !self.should_scan(path) {
            debug!(path = %path.display(), "Scanner::handle_saved: skipped");
            return None;
        }
        Some(self.scan_file(path, true).await)
    }

    // === Queries ===

    /// Items that are not completed
    pub fn open_items(&self) -> Vec<DetectedItem> {
        self.index.open()
    }

    pub fn all_items(&self) -> Vec<DetectedItem> {
        self.index.all()
    }

    pub fn get(&self, id: &str) -> Option<&DetectedItem> {
        self.index.get(id)
    }

    pub fn overdue(&self) -> Vec<DetectedItem> {
        self.index.overdue(dates::today())
    }

    pub fn overdue_on(&self, today: NaiveDate) -> Vec<DetectedItem> {
        self.index.overdue(today)
    }

    pub fn due_today(&self) -> Vec<DetectedItem> {
        self.index.due_today(dates::today())
    }

    pub fn due_today_on(&self, today: NaiveDate) -> Vec<DetectedItem> {
        self.index.due_today(today)
    }

    pub fn due_this_week(&self) -> Vec<DetectedItem> {
        self.index.due_this_week(dates::today())
    }

    pub fn due_this_week_on(&self, today: NaiveDate) -> Vec<DetectedItem> {
        self.index.due_this_week(today)
    }

    pub fn no_due_date(&self) -> Vec<DetectedItem> {
        self.index.no_due_date()
    }

    pub fn completed(&self) -> Vec<DetectedItem> {
        self.index.completed()
    }

    pub fn open_count(&self) -> usize {
        self.index.open().iter().filter(|item| item.is_open()).count()
    }

    /// Overdue plus due today
    pub fn due_count(&self) -> usize {
        self.due_count_on(dates::today())
    }

    pub fn due_count_on(&self, today: NaiveDate) -> usize {
        self.index.overdue(today).len() + self.index.due_today(today).len()
    }

    // === Status mutations ===

    pub fn mark_complete(&mut self, id: &str) -> Result<(), ScanError> {
        let now = Utc::now();
        debug!(%id, "Scanner::mark_complete: called");
        if let Some(item) = self.index.get_mut(id) {
            item.status = ItemStatus::Completed;
            item.completed_at = Some(now);
        }
        self.meta.mark_completed(id, now);
        self.persist_and_notify()
    }

    pub fn mark_open(&mut self, id: &str) -> Result<(), ScanError> {
        debug!(%id, "Scanner::mark_open: called");
        if let Some(item) = self.index.get_mut(id) {
            item.status = ItemStatus::Open;
            item.completed_at = None;
        }
        self.meta.mark_open(id, Utc::now());
        self.persist_and_notify()
    }

    pub fn snooze(&mut self, id: &str, until: NaiveDate) -> Result<(), ScanError> {
        debug!(%id, %until, "Scanner::snooze: called");
        if let Some(item) = self.index.get_mut(id) {
            item.status = ItemStatus::Snoozed;
        }
        self.meta.snooze(id, until, Utc::now());
        self.persist_and_notify()
    }

    fn persist_and_notify(&mut self) -> Result<(), ScanError> {
        self.meta.flush()?;
        self.events.emit(ScanEvent::ItemsChanged {
            items: self.index.open(),
        });
        Ok(())
    }
}
