//! MarkStore - durable metadata for tracked source comments
//!
//! Detected comments are volatile: they are rebuilt from source text on every
//! scan. What a user decides about them (completed, snoozed, when first seen)
//! is not in the source text, so it lives here.
//!
//! # Architecture
//!
//! ```text
//! state.json            # one JSON object, keyed like an editor's global state
//! ├── "marksync.todos.meta": [ PersistedMeta, ... ]
//! └── ...               # other keys are preserved untouched
//! state.json.lock       # exclusive lock held while rewriting
//! ```
//!
//! The whole key is read once at open and rewritten wholesale after each
//! mutation. Records are never removed.
//!
//! # Example
//!
//! ```ignore
//! use markstore::MetaStore;
//!
//! let mut store = MetaStore::open("state.json")?;
//! let (meta, created) = store.get_or_create_open("a1b2c3d4e5f6", chrono::Utc::now());
//! store.mark_completed("a1b2c3d4e5f6", chrono::Utc::now());
//! store.flush()?;
//! ```

mod error;
mod meta;
mod state_file;

pub use error::StoreError;
pub use meta::{ItemStatus, META_KEY, MetaStore, PersistedMeta};
pub use state_file::StateFile;
