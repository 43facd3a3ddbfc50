//! marksync - two-way sync between marker comments and tracked reminders
//!
//! Source files are scanned for `TODO`, `FIXME`, `HACK`, `XXX`, `BUG`,
//! `OPTIMIZE` and `REVIEW` comments (plus user-supplied patterns). Each hit
//! becomes a [`DetectedItem`] whose identity is derived from its position, and
//! whose status (open, completed, snoozed) survives restarts in a
//! [`markstore::MetaStore`]. Changes made through the [`SyncEngine`] are
//! written back into the comment text itself, then the file is rescanned.
//!
//! # Architecture
//!
//! ```text
//!  source files ──► Scanner ──► ItemIndex ──► queries (open, overdue, ...)
//!       ▲             │  ▲
//!       │             │  └── MetaStore (status, created/completed, snooze)
//!       │             ▼
//!       │          EventBus ──► ScanStarted / ItemsChanged / ScanCompleted
//!       │
//!  SyncEngine ── Documents (guarded single-line edits) ──► rescan
//! ```
//!
//! # Example
//!
//! ```ignore
//! use marksync::{EventBus, FsDocuments, Scanner, ScannerConfig, SyncEngine};
//! use markstore::MetaStore;
//!
//! let meta = MetaStore::open("state.json")?;
//! let mut scanner = Scanner::new(ScannerConfig::default(), vec![root], meta, EventBus::default());
//! let items = scanner.scan_workspace().await;
//!
//! let engine = SyncEngine::new(FsDocuments::new());
//! engine.set_due_date(&mut scanner, &items[0], date).await;
//! ```

pub mod cli;
pub mod config;
pub mod dates;
pub mod document;
pub mod error;
pub mod events;
pub mod identity;
pub mod index;
pub mod model;
pub mod patterns;
pub mod rewrite;
pub mod scanner;
pub mod sync;

pub use config::{Config, ScannerConfig, StorageConfig};
pub use document::{Document, Documents, FsDocuments, LineEdit};
pub use error::{DocumentError, ScanError, SyncError};
pub use events::{EventBus, ScanEvent};
pub use identity::item_id;
pub use model::{DetectedItem, ItemStatus, MarkerKind, Priority};
pub use patterns::PatternSet;
pub use scanner::Scanner;
pub use sync::SyncEngine;
