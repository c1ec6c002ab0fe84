//! Download deduplication keyed by query string
//!
//! Two resources carrying the same non-empty query string are treated as one
//! cache slot, whatever their paths. Dynamically parameterized URLs
//! (`?v=123`, tracking tokens) would otherwise multiply downloads without bound.

use crate::mirror::ResourceRecord;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

type Slot = Arc<OnceCell<ResourceRecord>>;

/// Query string to resource record map shared by every worker of a crawl
#[derive(Debug, Default)]
pub struct ResourceCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl ResourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, query: &str) -> Slot {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(slots.entry(query.to_string()).or_default())
    }

    /// Returns the record stored for a query string, if any
    pub fn lookup(&self, query: &str) -> Option<ResourceRecord> {
        let slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.get(query).and_then(|slot| slot.get().cloned())
    }

    /// Stores a record unless one is already present
    ///
    /// Returns the record that ends up in the cache: the existing one if a
    /// previous call (or an in-flight download) got there first.
    pub async fn record(&self, query: &str, record: ResourceRecord) -> ResourceRecord {
        self.slot(query)
            .get_or_init(|| async move { record })
            .await
            .clone()
    }

    /// Returns the cached record, or runs `init` to produce it
    ///
    /// Concurrent callers with the same query string wait for the first one;
    /// `init` runs at most once per successful slot. If it fails, the next
    /// waiter gets to try. The flag is true for the caller whose `init` ran.
    pub async fn get_or_try_init<F, Fut, E>(&self, query: &str, init: F) -> Result<(ResourceRecord, bool), E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ResourceRecord, E>>,
    {
        let slot = self.slot(query);
        let mut initialized = false;

        let record = slot
            .get_or_try_init(|| {
                initialized = true;
                init()
            })
            .await?
            .clone();

        Ok((record, initialized))
    }

    /// Number of query strings with a stored record
    pub fn len(&self) -> usize {
        let slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
