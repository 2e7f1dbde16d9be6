//! In-memory implementation of the `RecordStore` trait.
//!
//! Used for tests and for embedding the engine in another process. Every
//! mutation wakes all subscribers, the same coarse way a native store does.
//! Failure injection covers the error paths the coordinator must survive.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use contact_core::{Record, RecordId};

use crate::error::{SyncError, SyncResult};
use crate::store::{AccessStatus, RecordStore, Subscription, WakeSignal};

/// In-memory record store. Clones share the same records.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
    fetch_all_calls: Arc<AtomicUsize>,
}

struct MemoryStoreInner {
    records: BTreeMap<RecordId, Record>,

    status: AccessStatus,

    /// What `request_access` resolves `NotDetermined` to.
    request_outcome: AccessStatus,

    /// Successful `fetch_all` calls still allowed before `failing_fetches`
    /// kicks in.
    fetches_before_failure: usize,

    /// Number of upcoming `fetch_all` calls that fail.
    failing_fetches: usize,

    /// Every `fetch_all` fails while set.
    fetch_all_broken: bool,

    /// Ids `fetch_by_ids` cannot produce.
    failing_ids: BTreeSet<RecordId>,

    /// Artificial latency of `fetch_all`.
    fetch_delay: Option<Duration>,

    subscribers: BTreeMap<u64, WakeSignal>,
    next_subscriber: u64,
}

impl MemoryStore {
    /// Creates an empty, authorized store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MemoryStoreInner {
                records: BTreeMap::new(),
                status: AccessStatus::Granted,
                request_outcome: AccessStatus::Granted,
                fetches_before_failure: 0,
                failing_fetches: 0,
                fetch_all_broken: false,
                failing_ids: BTreeSet::new(),
                fetch_delay: None,
                subscribers: BTreeMap::new(),
                next_subscriber: 0,
            })),
            fetch_all_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates an authorized store holding `records`.
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        {
            let mut inner = store.write();
            for record in records {
                inner.records.insert(record.identifier.clone(), record);
            }
        }
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryStoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryStoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_subscribers(&self) {
        let subscribers: Vec<WakeSignal> = self.read().subscribers.values().cloned().collect();
        debug!(subscribers = subscribers.len(), "Store changed, waking subscribers");
        for wake in subscribers {
            wake.wake();
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Adds or replaces a record.
    pub fn upsert(&self, record: Record) {
        self.write().records.insert(record.identifier.clone(), record);
        self.notify_subscribers();
    }

    /// Removes a record. Returns whether it existed.
    pub fn remove(&self, identifier: &str) -> bool {
        let removed = self.write().records.remove(identifier).is_some();
        self.notify_subscribers();
        removed
    }

    /// Wakes subscribers without changing anything.
    pub fn touch(&self) {
        self.notify_subscribers();
    }

    // =========================================================================
    // Authorization
    // =========================================================================

    pub fn set_access_status(&self, status: AccessStatus) {
        self.write().status = status;
    }

    /// Sets what the prompt resolves to when the status is `NotDetermined`.
    pub fn set_request_outcome(&self, outcome: AccessStatus) {
        self.write().request_outcome = outcome;
    }

    // =========================================================================
    // Failure Injection
    // =========================================================================

    /// Makes the next `count` calls to `fetch_all` fail.
    pub fn fail_next_fetch_all(&self, count: usize) {
        self.fail_fetch_all_after(0, count);
    }

    /// Lets `successes` calls to `fetch_all` through, then fails `count`.
    pub fn fail_fetch_all_after(&self, successes: usize, count: usize) {
        let mut inner = self.write();
        inner.fetches_before_failure = successes;
        inner.failing_fetches = count;
    }

    /// Makes every `fetch_all` fail until reset.
    pub fn set_fetch_all_broken(&self, broken: bool) {
        self.write().fetch_all_broken = broken;
    }

    /// Makes `fetch_by_ids` omit `identifier`.
    pub fn fail_id(&self, identifier: impl Into<RecordId>) {
        self.write().failing_ids.insert(identifier.into());
    }

    /// Delays every `fetch_all` by `delay`.
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        self.write().fetch_delay = delay;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().records.is_empty()
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().subscribers.len()
    }

    /// Number of `fetch_all` calls so far, failed ones included.
    pub fn fetch_all_calls(&self) -> usize {
        self.fetch_all_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("MemoryStore")
            .field("records", &inner.records.len())
            .field("status", &inner.status)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn authorization_status(&self) -> AccessStatus {
        self.read().status
    }

    async fn request_access(&self) -> SyncResult<AccessStatus> {
        let mut inner = self.write();
        if inner.status == AccessStatus::NotDetermined {
            inner.status = inner.request_outcome;
        }
        Ok(inner.status)
    }

    async fn fetch_all(&self) -> SyncResult<Vec<Record>> {
        self.fetch_all_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.read().fetch_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.write();
        if inner.fetch_all_broken {
            return Err(SyncError::FetchFailed("store unavailable".into()));
        }
        if inner.fetches_before_failure > 0 {
            inner.fetches_before_failure -= 1;
        } else if inner.failing_fetches > 0 {
            inner.failing_fetches -= 1;
            return Err(SyncError::FetchFailed("injected fetch failure".into()));
        }

        Ok(inner.records.values().cloned().collect())
    }

    async fn fetch_by_ids(&self, ids: &BTreeSet<RecordId>) -> Vec<Record> {
        let inner = self.read();
        ids.iter()
            .filter_map(|id| {
                if inner.failing_ids.contains(id) {
                    warn!(identifier = %id, "Record could not be fetched, skipping");
                    return None;
                }
                let record = inner.records.get(id).cloned();
                if record.is_none() {
                    debug!(identifier = %id, "Record vanished before fetch, skipping");
                }
                record
            })
            .collect()
    }

    fn subscribe(&self, wake: WakeSignal) -> SyncResult<Subscription> {
        let id = {
            let mut inner = self.write();
            let id = inner.next_subscriber;
            inner.next_subscriber += 1;
            inner.subscribers.insert(id, wake);
            id
        };
        debug!(subscriber = id, "Subscriber registered");

        let weak: Weak<RwLock<MemoryStoreInner>> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .subscribers
                    .remove(&id);
            }
        }))
    }
}
