//! # contact-sync: Change Detection Engine for Contact Watch
//!
//! This crate turns a coarse "something changed" signal from a record store
//! into a consistent, incremental stream of JSON frames on stdout.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Engine Architecture                              │
//! │                                                                         │
//! │  ┌────────────────┐  wake()   ┌──────────────────────────────────────┐ │
//! │  │  RecordStore   │ ────────► │  bounded wake channel (capacity 1)   │ │
//! │  │                │           └──────────────────┬───────────────────┘ │
//! │  │ MemoryStore    │                              │                     │
//! │  │ DirectoryStore │                              ▼                     │
//! │  └───────▲────────┘           ┌──────────────────────────────────────┐ │
//! │          │ fetch_all          │        ChangeCoordinator             │ │
//! │          │ fetch_by_ids       │                                      │ │
//! │          └────────────────────│  Snapshot ──► diff ──► ChangeSet     │ │
//! │                               │  Idle / Syncing / Recovering         │ │
//! │                               └──────────────────┬───────────────────┘ │
//! │                                                  │ SyncEvent           │
//! │                                                  ▼                     │
//! │                               ┌──────────────────────────────────────┐ │
//! │                               │  SyncEmitter ──► one frame, one write│ │
//! │                               └──────────────────┬───────────────────┘ │
//! │                                                  ▼                     │
//! │                                               stdout                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`coordinator`] - `ChangeCoordinator`, its handle and status
//! - [`store`] - `RecordStore` contract, wake signal, subscription
//! - [`memory`] - In-memory store with failure injection
//! - [`directory`] - Store over a directory of JSON documents
//! - [`formatter`] - Native document → `Record`
//! - [`protocol`] - `SyncEvent` and frame encoding
//! - [`emitter`] - Atomic frame writes
//! - [`config`] - TOML + environment configuration
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use contact_sync::{ChangeCoordinator, MemoryStore, SyncEmitter, WatchConfig};
//!
//! let config = WatchConfig::load(None)?;
//! config.validate()?;
//! let store = Arc::new(MemoryStore::new());
//! let emitter = Arc::new(SyncEmitter::stdout(config.output.pretty));
//!
//! let (mut coordinator, handle) = ChangeCoordinator::new(store, emitter, config.sync);
//! coordinator.start().await?;
//! tokio::spawn(coordinator.run());
//!
//! let status = handle.status().await;
//! println!("Known records: {}", status.snapshot_len);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod coordinator;
pub mod directory;
pub mod emitter;
pub mod error;
pub mod formatter;
pub mod memory;
pub mod protocol;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{OutputSettings, StoreSettings, SyncSettings, WatchConfig};
pub use coordinator::{
    ChangeCoordinator, CoordinatorHandle, CoordinatorState, CycleOutcome, SyncStatus,
};
pub use directory::DirectoryStore;
pub use emitter::{MemorySink, SyncEmitter};
pub use error::{SyncError, SyncResult};
pub use formatter::{JsonContactFormatter, NativeContact, RecordFormatter};
pub use memory::MemoryStore;
pub use protocol::{decode_frames, encode_frame, FrameDecoder, SyncEvent, TaggedRecord};
pub use store::{ensure_access, AccessStatus, RecordStore, Subscription, WakeSignal};
