//! # Record Store Contract
//!
//! The interface the coordinator consumes from the underlying record store.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RecordStore                                      │
//! │                                                                         │
//! │  authorization_status() ──► Granted | Denied | Restricted | NotDetermined│
//! │  request_access()       ──► one blocking call, resolves NotDetermined  │
//! │                                                                         │
//! │  fetch_all()            ──► Vec<Record> | FetchFailed                  │
//! │  fetch_by_ids(ids)      ──► Vec<Record>  (best effort, never fails)    │
//! │                                                                         │
//! │  subscribe(WakeSignal)  ──► Subscription                               │
//! │                                                                         │
//! │     store thread ── wake() ──► [ bounded channel, capacity 1 ]         │
//! │     store thread ── wake() ──► (full: already pending, coalesced)      │
//! │                                          │                              │
//! │                                          ▼                              │
//! │                              ChangeCoordinator loop                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Notifications carry no payload: the store cannot say which record
//! changed, only that something did.

use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use contact_core::{Record, RecordId};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Access Status
// =============================================================================

/// Authorization state of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessStatus {
    /// The user has not decided yet; `request_access` will ask.
    NotDetermined,
    /// Access is blocked by policy and cannot be requested.
    Restricted,
    /// The user refused access.
    Denied,
    /// Records may be read.
    Granted,
}

impl AccessStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessStatus::Granted)
    }
}

impl std::fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccessStatus::NotDetermined => write!(f, "not determined"),
            AccessStatus::Restricted => write!(f, "restricted"),
            AccessStatus::Denied => write!(f, "denied"),
            AccessStatus::Granted => write!(f, "granted"),
        }
    }
}

// =============================================================================
// Wake Signal
// =============================================================================

/// Capacity of the wake channel. One slot is enough: a token already in the
/// channel means "sync again", and a second token would say the same thing.
pub const WAKE_CHANNEL_CAPACITY: usize = 1;

/// Payload-free change notification handed to a store.
///
/// Safe to call from any thread, including non-async callbacks.
#[derive(Debug, Clone)]
pub struct WakeSignal {
    tx: mpsc::Sender<()>,
}

impl WakeSignal {
    /// Creates a signal and the receiver the coordinator drains.
    pub fn channel() -> (WakeSignal, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(WAKE_CHANNEL_CAPACITY);
        (WakeSignal { tx }, rx)
    }

    /// Records that something changed.
    ///
    /// Returns `false` when the wake-up was coalesced into one already
    /// pending or the coordinator is gone.
    pub fn wake(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                debug!("Wake-up coalesced into pending token");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => {
                debug!("Wake-up dropped, coordinator stopped");
                false
            }
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Registration for change notifications. Released on drop.
pub struct Subscription {
    release: Mutex<Option<ReleaseFn>>,
}

type ReleaseFn = Box<dyn FnOnce() + Send>;

impl Subscription {
    /// Creates a subscription that runs `release` when it ends.
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            release: Mutex::new(Some(Box::new(release))),
        }
    }

    /// Ends the subscription now.
    pub fn release(mut self) {
        self.run_release();
    }

    fn run_release(&mut self) {
        let release = self
            .release
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(release) = release {
            release();
        }
    }

    fn is_active(&self) -> bool {
        self.release
            .lock()
            .map(|release| release.is_some())
            .unwrap_or(false)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

// =============================================================================
// Record Store Trait
// =============================================================================

/// The record store as seen by the coordinator.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Current authorization state, without prompting.
    async fn authorization_status(&self) -> AccessStatus;

    /// Asks for access once. Only meaningful when the status is
    /// `NotDetermined`; otherwise returns the current status.
    async fn request_access(&self) -> SyncResult<AccessStatus>;

    /// Full enumeration. Order is not significant.
    async fn fetch_all(&self) -> SyncResult<Vec<Record>>;

    /// Best-effort fetch. Unknown or failing ids are omitted and logged,
    /// never reported as an error.
    async fn fetch_by_ids(&self, ids: &BTreeSet<RecordId>) -> Vec<Record>;

    /// Registers `wake` to be called whenever anything in the store changes.
    fn subscribe(&self, wake: WakeSignal) -> SyncResult<Subscription>;
}

/// Makes sure the store is readable, prompting at most once.
///
/// Returns `AccessDenied` for anything other than a granted status.
pub async fn ensure_access(store: &dyn RecordStore) -> SyncResult<()> {
    let status = store.authorization_status().await;
    info!(%status, "Record store access status");

    let status = match status {
        AccessStatus::NotDetermined => {
            info!("Requesting record store access...");
            store.request_access().await?
        }
        other => other,
    };

    if !status.is_granted() {
        warn!(%status, "Record store access denied or restricted");
        return Err(SyncError::AccessDenied(status));
    }

    info!("Record store access granted");
    Ok(())
}
