//! Per-form snapshot cache
//!
//! Keeps one [`Aggregator`] per form and folds in only the responses stored
//! after its watermark. An entry is rebuilt from the full log when the
//! form's schema changes (`updatedAt` differs from the one it was built for).
//!
//! At most `capacity` forms are kept; reading a form beyond that evicts the
//! one read least recently.

use super::{Aggregator, FormAnalytics};
use crate::db;
use forma_common::model::Form;
use forma_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Forms kept by [`SnapshotCache::new`]
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

#[derive(Debug)]
struct CachedForm {
    schema_version: i64,
    aggregator: Aggregator,
}

type Slot = Arc<tokio::sync::Mutex<Option<CachedForm>>>;

#[derive(Debug)]
struct Entry {
    slot: Slot,
    last_read: u64,
}

#[derive(Debug, Default)]
struct Entries {
    by_form: HashMap<String, Entry>,
    clock: u64,
}

/// Incremental analytics, one accumulator per form
#[derive(Debug)]
pub struct SnapshotCache {
    entries: Mutex<Entries>,
    capacity: usize,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// Cache holding at most `capacity` forms (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    /// Number of forms currently cached
    pub fn len(&self) -> usize {
        self.lock().by_form.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current analytics for `form`
    ///
    /// A store failure is returned as-is and leaves the cached accumulator
    /// untouched.
    pub async fn snapshot(&self, pool: &SqlitePool, form: &Form) -> Result<FormAnalytics> {
        let slot = self.slot(&form.id);
        // Readers of the same form take turns; other forms are unaffected
        let mut guard = slot.lock().await;

        if guard
            .as_ref()
            .is_some_and(|cached| cached.schema_version != form.updated_at)
        {
            debug!("Schema of form {} changed, rebuilding analytics", form.id);
            *guard = None;
        }

        let cursor = guard
            .as_ref()
            .and_then(|cached| cached.aggregator.watermark())
            .unwrap_or(i64::MIN);
        let fresh = db::list_since(pool, &form.id, cursor).await?;

        let cached = guard.get_or_insert_with(|| CachedForm {
            schema_version: form.updated_at,
            aggregator: Aggregator::new(form),
        });
        if !fresh.is_empty() {
            debug!("Folding {} new responses into form {}", fresh.len(), form.id);
            cached.aggregator.absorb_all(&fresh);
        }

        Ok(cached.aggregator.snapshot())
    }

    /// Drop the accumulator for a form
    pub fn invalidate(&self, form_id: &str) {
        self.lock().by_form.remove(form_id);
    }

    fn slot(&self, form_id: &str) -> Slot {
        let mut entries = self.lock();
        entries.clock += 1;
        let now = entries.clock;

        if let Some(entry) = entries.by_form.get_mut(form_id) {
            entry.last_read = now;
            return entry.slot.clone();
        }

        if entries.by_form.len() >= self.capacity {
            let oldest = entries
                .by_form
                .iter()
                .min_by_key(|(_, entry)| entry.last_read)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                debug!("Evicting cached analytics for form {}", oldest);
                // A reader still holding the slot finishes on its own copy
                entries.by_form.remove(&oldest);
            }
        }

        let slot = Slot::default();
        entries.by_form.insert(
            form_id.to_string(),
            Entry {
                slot: slot.clone(),
                last_read: now,
            },
        );
        slot
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
