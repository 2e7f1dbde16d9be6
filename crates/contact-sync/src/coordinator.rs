//! # Change Coordinator
//!
//! Owns the committed snapshot and runs one sync cycle at a time.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Coordinator States                                 │
//! │                                                                         │
//! │            wake / poll tick                                             │
//! │   ┌──────┐ ───────────────► ┌─────────┐  fetch / emit failed  ┌───────┐│
//! │   │ Idle │                  │ Syncing │ ────────────────────► │Recov- ││
//! │   │      │ ◄─────────────── │         │                       │ering  ││
//! │   └──────┘  emitted+commit  └─────────┘                       └───┬───┘│
//! │      ▲      or no change         ▲                                │    │
//! │      │                           │ PendingRetrigger               │    │
//! │      │                           └────────────────────────────────┤    │
//! │      └────────────────────────────────────────────────────────────┘    │
//! │                         Initial frame emitted (or not), commit         │
//! │                                                                         │
//! │  SYNCING                                                               │
//! │  ───────                                                               │
//! │  1. newIds = Ids(fetch_all())                                          │
//! │  2. changes = diff(snapshot, newIds)                                   │
//! │  3. nothing to report → commit, Idle (no frame)                        │
//! │  4. fetch_by_ids(added ∪ retained), tag added / modified               │
//! │  5. emit Update{contacts, deleted_contacts}                            │
//! │  6. commit newIds                                                      │
//! │                                                                         │
//! │  RECOVERING                                                            │
//! │  ──────────                                                            │
//! │  fetch_all() → emit Initial → commit fresh ids (even if emit failed)   │
//! │  fetch failed → keep prior snapshot                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Wake-ups that arrive during a cycle leave a token in the wake channel.
//! After the cycle the token is drained into `pending_retrigger`, so any
//! number of them cause exactly one more cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use contact_core::{diff, ChangeSet, ChangeTag, Snapshot};

use crate::config::SyncSettings;
use crate::emitter::SyncEmitter;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{SyncEvent, TaggedRecord};
use crate::store::{RecordStore, Subscription, WakeSignal};

// =============================================================================
// Coordinator State
// =============================================================================

/// Where the coordinator is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    #[default]
    Idle,
    Syncing,
    Recovering,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Idle => write!(f, "idle"),
            CoordinatorState::Syncing => write!(f, "syncing"),
            CoordinatorState::Recovering => write!(f, "recovering"),
        }
    }
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to report; no frame written.
    Unchanged,

    /// An `Update` frame was written.
    Updated {
        added: usize,
        modified: usize,
        deleted: usize,
    },

    /// The cycle failed and an `Initial` frame re-anchored the stream.
    Recovered { contacts: usize },

    /// The cycle failed and so did recovery. The snapshot may or may not
    /// have advanced, depending on whether the recovery fetch succeeded.
    RecoveryFailed,
}

// =============================================================================
// Sync Status
// =============================================================================

/// Current coordinator status for external queries.
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    pub state: CoordinatorState,

    /// Size of the committed snapshot.
    pub snapshot_len: usize,

    /// Completed cycles (startup excluded).
    pub cycles: u64,

    /// Cycles that went through recovery.
    pub recoveries: u64,

    /// Duration of the last cycle.
    pub last_cycle: Option<Duration>,

    /// Time from the wake-up to the frame reaching the sink, for the last
    /// cycle that emitted one.
    pub last_change_latency: Option<Duration>,

    /// Last error message (if any).
    pub last_error: Option<String>,

    /// Last successful commit timestamp (RFC 3339).
    pub last_sync: Option<String>,
}

// =============================================================================
// Coordinator Handle
// =============================================================================

/// Handle for controlling a running coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorHandle {
    shutdown_tx: mpsc::Sender<()>,
    status: Arc<RwLock<SyncStatus>>,
    wake: WakeSignal,
}

impl CoordinatorHandle {
    /// Requests a graceful shutdown. An in-flight cycle completes first.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Coordinator already stopped".into()))
    }

    /// Returns the current status.
    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Triggers a cycle as if the store had signalled a change.
    pub fn wake(&self) -> bool {
        self.wake.wake()
    }
}

// =============================================================================
// Change Coordinator
// =============================================================================

/// Single owner of the snapshot; drives every cycle.
pub struct ChangeCoordinator {
    store: Arc<dyn RecordStore>,
    emitter: Arc<SyncEmitter>,
    settings: SyncSettings,

    /// Ids of the last successfully emitted event.
    snapshot: Snapshot,

    status: Arc<RwLock<SyncStatus>>,

    wake: WakeSignal,
    wake_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,

    subscription: Option<Subscription>,

    /// Set when wake-ups arrived while a cycle was running.
    pending_retrigger: bool,

    /// When the wake-up that started the current cycle arrived.
    woke_at: Option<Instant>,
}

impl ChangeCoordinator {
    /// Creates a new coordinator and its handle.
    pub fn new(
        store: Arc<dyn RecordStore>,
        emitter: Arc<SyncEmitter>,
        settings: SyncSettings,
    ) -> (Self, CoordinatorHandle) {
        let (wake, wake_rx) = WakeSignal::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let status = Arc::new(RwLock::new(SyncStatus::default()));

        let coordinator = ChangeCoordinator {
            store,
            emitter,
            settings,
            snapshot: Snapshot::empty(),
            status: status.clone(),
            wake: wake.clone(),
            wake_rx,
            shutdown_rx,
            subscription: None,
            pending_retrigger: false,
            woke_at: None,
        };

        let handle = CoordinatorHandle {
            shutdown_tx,
            status,
            wake,
        };

        (coordinator, handle)
    }

    /// The committed snapshot.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Publishes the full store contents and subscribes to changes.
    ///
    /// Any failure here is fatal: nothing trustworthy has been published.
    pub async fn start(&mut self) -> SyncResult<()> {
        info!("Starting initial synchronization");
        let started = Instant::now();

        let records = self
            .store
            .fetch_all()
            .await
            .map_err(|e| SyncError::InitialSyncFailed(e.to_string()))?;

        let fresh = Snapshot::from_records(&records);
        let count = records.len();

        self.emitter
            .emit(&SyncEvent::initial(records))
            .map_err(|e| SyncError::InitialSyncFailed(e.to_string()))?;
        self.commit(fresh).await;

        self.subscription = Some(self.store.subscribe(self.wake.clone())?);

        info!(
            contacts = count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Initial synchronization complete"
        );
        Ok(())
    }

    /// Runs the loop until shutdown is requested or every handle is dropped.
    pub async fn run(mut self) {
        info!(
            poll_interval_ms = self.settings.poll_interval_ms,
            poll_fallback = self.settings.poll_fallback,
            "Watching for changes"
        );

        let mut interval = tokio::time::interval(self.settings.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            if self.pending_retrigger {
                self.pending_retrigger = false;
                if self.shutdown_requested() {
                    info!("Shutdown requested, dropping pending retrigger");
                    break;
                }
                debug!("Changes arrived during the last cycle, syncing again");
                self.run_cycle().await;
                continue;
            }

            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    info!("Coordinator received shutdown signal");
                    break;
                }

                token = self.wake_rx.recv() => {
                    if token.is_none() {
                        warn!("Wake channel closed");
                        break;
                    }
                    self.woke_at = Some(Instant::now());
                    self.run_cycle().await;
                }

                _ = interval.tick() => {
                    if self.settings.poll_fallback {
                        debug!("Poll tick, checking for changes");
                        self.woke_at = Some(Instant::now());
                        self.run_cycle().await;
                    }
                }
            }
        }

        if let Some(subscription) = self.subscription.take() {
            subscription.release();
        }
        info!("Coordinator stopped");
    }

    fn shutdown_requested(&mut self) -> bool {
        matches!(
            self.shutdown_rx.try_recv(),
            Ok(()) | Err(mpsc::error::TryRecvError::Disconnected)
        )
    }

    // =========================================================================
    // Cycles
    // =========================================================================

    /// Runs one cycle, recovering if it fails.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        let started = Instant::now();
        self.set_state(CoordinatorState::Syncing).await;

        let outcome = match self.sync_changes().await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Sync cycle failed, resynchronizing");
                self.record_error(&e).await;
                self.recover().await
            }
        };

        let elapsed = started.elapsed();
        {
            let mut status = self.status.write().await;
            status.state = CoordinatorState::Idle;
            status.cycles += 1;
            status.last_cycle = Some(elapsed);
            if matches!(outcome, CycleOutcome::Recovered { .. } | CycleOutcome::RecoveryFailed) {
                status.recoveries += 1;
            }
        }

        debug!(?outcome, elapsed_ms = elapsed.as_millis() as u64, "Cycle finished");

        self.woke_at = None;
        if self.wake_rx.try_recv().is_ok() {
            self.pending_retrigger = true;
            self.woke_at = Some(Instant::now());
        }

        outcome
    }

    /// The Syncing step.
    async fn sync_changes(&mut self) -> SyncResult<CycleOutcome> {
        let records = self.store.fetch_all().await?;
        let fresh = Snapshot::from_records(&records);
        drop(records);

        let changes = diff(&self.snapshot, &fresh);
        if changes.is_empty() {
            debug!("No records before or after, nothing to emit");
            self.commit(fresh).await;
            return Ok(CycleOutcome::Unchanged);
        }

        if !changes.has_membership_changes() {
            debug!(
                retained = changes.retained.len(),
                "Membership unchanged, re-emitting retained records"
            );
        }

        let contacts = self.build_update(&changes).await;
        let added = contacts
            .iter()
            .filter(|c| c.change_tag == ChangeTag::Added)
            .count();
        let outcome = CycleOutcome::Updated {
            added,
            modified: contacts.len() - added,
            deleted: changes.deleted.len(),
        };
        let event = SyncEvent::update(contacts, changes.deleted.iter().cloned().collect());

        self.emitter.emit(&event)?;
        self.record_latency().await;
        self.commit(fresh).await;

        info!(
            added = changes.added.len(),
            deleted = changes.deleted.len(),
            retained = changes.retained.len(),
            "Update emitted"
        );
        Ok(outcome)
    }

    /// Fetches the affected records and tags each one.
    async fn build_update(&self, changes: &ChangeSet) -> Vec<TaggedRecord> {
        let affected = changes.affected();
        let fetched = self.store.fetch_by_ids(&affected).await;

        if fetched.len() < affected.len() {
            warn!(
                requested = affected.len(),
                fetched = fetched.len(),
                "Some changed records could not be fetched and were omitted"
            );
        }

        fetched
            .into_iter()
            .filter_map(|record| {
                let tag = changes.tag_for(&record.identifier)?;
                debug!(
                    identifier = %record.identifier,
                    name = %record.display_name(),
                    %tag,
                    "Record changed"
                );
                Some(TaggedRecord::new(record, tag))
            })
            .collect()
    }

    /// The Recovering step.
    async fn recover(&mut self) -> CycleOutcome {
        self.set_state(CoordinatorState::Recovering).await;

        let records = match self.store.fetch_all().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Recovery fetch failed, keeping previous snapshot");
                self.record_error(&e).await;
                return CycleOutcome::RecoveryFailed;
            }
        };

        let fresh = Snapshot::from_records(&records);
        let count = records.len();
        let emitted = self.emitter.emit(&SyncEvent::initial(records));

        // The fresh ids become the baseline either way.
        self.commit(fresh).await;

        match emitted {
            Ok(()) => {
                self.record_latency().await;
                info!(contacts = count, "Resynchronized with full snapshot");
                CycleOutcome::Recovered { contacts: count }
            }
            Err(e) => {
                error!(error = %e, "Recovery emit failed");
                self.record_error(&e).await;
                CycleOutcome::RecoveryFailed
            }
        }
    }

    // =========================================================================
    // Status Bookkeeping
    // =========================================================================

    async fn commit(&mut self, fresh: Snapshot) {
        self.snapshot = fresh;

        let mut status = self.status.write().await;
        status.snapshot_len = self.snapshot.len();
        status.last_sync = Some(chrono::Utc::now().to_rfc3339());
    }

    async fn set_state(&self, state: CoordinatorState) {
        self.status.write().await.state = state;
    }

    async fn record_error(&self, err: &SyncError) {
        self.status.write().await.last_error = Some(err.to_string());
    }

    async fn record_latency(&self) {
        if let Some(woke_at) = self.woke_at {
            let latency = woke_at.elapsed();
            debug!(latency_ms = latency.as_millis() as u64, "Change published");
            self.status.write().await.last_change_latency = Some(latency);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::MemorySink;
    use crate::memory::MemoryStore;
    use contact_core::Record;

    fn setup(store: &MemoryStore) -> (ChangeCoordinator, CoordinatorHandle, MemorySink) {
        let sink = MemorySink::new();
        let emitter = Arc::new(SyncEmitter::new(sink.clone(), false));
        let (coordinator, handle) =
            ChangeCoordinator::new(Arc::new(store.clone()), emitter, SyncSettings::default());
        (coordinator, handle, sink)
    }

    #[tokio::test]
    async fn test_start_emits_initial_and_subscribes() {
        let store = MemoryStore::with_records([Record::new("1"), Record::new("2")]);
        let (mut coordinator, _handle, sink) = setup(&store);

        coordinator.start().await.unwrap();

        assert_eq!(coordinator.snapshot().len(), 2);
        assert_eq!(store.subscriber_count(), 1);
        let events = sink.events().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].type_name(), "initial");
    }

    #[tokio::test]
    async fn test_empty_store_emits_nothing() {
        let store = MemoryStore::new();
        let (mut coordinator, _handle, sink) = setup(&store);
        coordinator.start().await.unwrap();

        let outcome = coordinator.run_cycle().await;
        assert_eq!(outcome, CycleOutcome::Unchanged);
        assert_eq!(sink.events().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cycle_tags_changes() {
        let store = MemoryStore::with_records(["1", "2", "3"].map(Record::new));
        let (mut coordinator, _handle, sink) = setup(&store);
        coordinator.start().await.unwrap();

        store.remove("1");
        store.upsert(Record::new("4"));

        let outcome = coordinator.run_cycle().await;
        assert_eq!(
            outcome,
            CycleOutcome::Updated {
                added: 1,
                modified: 2,
                deleted: 1
            }
        );

        let events = sink.events().unwrap();
        match &events[1] {
            SyncEvent::Update {
                contacts,
                deleted_ids,
            } => {
                let added: Vec<_> = contacts
                    .iter()
                    .filter(|c| c.change_tag == ChangeTag::Added)
                    .map(|c| c.record.identifier.as_str())
                    .collect();
                assert_eq!(added, vec!["4"]);
                assert_eq!(deleted_ids, &vec!["1".to_string()]);
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert!(coordinator.snapshot().contains("4"));
        assert!(!coordinator.snapshot().contains("1"));
    }

    #[tokio::test]
    async fn test_start_fails_on_fetch_error() {
        let store = MemoryStore::new();
        store.fail_next_fetch_all(1);
        let (mut coordinator, _handle, sink) = setup(&store);

        let err = coordinator.start().await.unwrap_err();
        assert!(matches!(err, SyncError::InitialSyncFailed(_)));
        assert!(err.is_fatal_at_startup());
        assert!(sink.contents().is_empty());
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_status_tracks_cycles() {
        let store = MemoryStore::with_records([Record::new("1")]);
        let (mut coordinator, handle, _sink) = setup(&store);
        coordinator.start().await.unwrap();

        store.fail_next_fetch_all(1);
        coordinator.run_cycle().await;

        let status = handle.status().await;
        assert_eq!(status.state, CoordinatorState::Idle);
        assert_eq!(status.cycles, 1);
        assert_eq!(status.recoveries, 1);
        assert_eq!(status.snapshot_len, 1);
        assert!(status.last_error.is_some());
        assert!(status.last_sync.is_some());
    }
}
