//! Persisted status overlay for detected comments

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{StateFile, StoreError};

/// Key under which the metadata list is stored
pub const META_KEY: &str = "marksync.todos.meta";

/// User-controlled status of a tracked comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Open,
    Completed,
    Snoozed,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Completed => write!(f, "completed"),
            Self::Snoozed => write!(f, "snoozed"),
        }
    }
}

/// Durable record for one comment identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedMeta {
    pub id: String,
    pub status: ItemStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snoozed_until: Option<NaiveDate>,
}

impl PersistedMeta {
    /// A fresh open record first seen at `now`
    pub fn open(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            status: ItemStatus::Open,
            created_at: now,
            completed_at: None,
            snoozed_until: None,
        }
    }
}

/// Map of id to [`PersistedMeta`], materialized from a [`StateFile`]
///
/// Mutations only touch memory; [`MetaStore::flush`] rewrites the whole list.
#[derive(Debug)]
pub struct MetaStore {
    state: StateFile,
    records: BTreeMap<String, PersistedMeta>,
}

impl MetaStore {
    /// Open the store, loading every record under [`META_KEY`]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let state = StateFile::open(path)?;
        let stored: Vec<PersistedMeta> = state.get(META_KEY)?.unwrap_or_default();
        let records: BTreeMap<_, _> = stored.into_iter().map(|m| (m.id.clone(), m)).collect();
        info!(count = records.len(), path = %state.path().display(), "Loaded comment metadata");
        Ok(Self { state, records })
    }

    pub fn get(&self, id: &str) -> Option<&PersistedMeta> {
        self.records.get(id)
    }

    /// Return the record for `id`, inserting a fresh open one if absent
    ///
    /// The boolean is true when the record was created by this call.
    pub fn get_or_create_open(&mut self, id: &str, now: DateTime<Utc>) -> (PersistedMeta, bool) {
        if let Some(existing) = self.records.get(id) {
            return (existing.clone(), false);
        }
        debug!(%id, "MetaStore::get_or_create_open: new record");
        let meta = PersistedMeta::open(id, now);
        self.records.insert(id.to_string(), meta.clone());
        (meta, true)
    }

    /// Mark `id` completed at `at`, creating the record if needed
    pub fn mark_completed(&mut self, id: &str, at: DateTime<Utc>) -> &PersistedMeta {
        let meta = self.entry(id, at);
        meta.status = ItemStatus::Completed;
        meta.completed_at = Some(at);
        meta
    }

    /// Reopen `id`, clearing its completion time
    pub fn mark_open(&mut self, id: &str, now: DateTime<Utc>) -> &PersistedMeta {
        let meta = self.entry(id, now);
        meta.status = ItemStatus::Open;
        meta.completed_at = None;
        meta
    }

    /// Snooze `id` until `until`
    pub fn snooze(&mut self, id: &str, until: NaiveDate, now: DateTime<Utc>) -> &PersistedMeta {
        let meta = self.entry(id, now);
        meta.status = ItemStatus::Snoozed;
        meta.snoozed_until = Some(until);
        meta
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &PersistedMeta> {
        self.records.values()
    }

    /// Rewrite the whole metadata list to disk
    pub fn flush(&mut self) -> Result<(), StoreError> {
        let list: Vec<&PersistedMeta> = self.records.values().collect();
        debug!(count = list.len(), "MetaStore::flush: writing");
        self.state.update(META_KEY, &list)
    }

    fn entry(&mut self, id: &str, now: DateTime<Utc>) -> &mut PersistedMeta {
        self.records
            .entry(id.to_string())
            .or_insert_with(|| PersistedMeta::open(id, now))
    }
}
