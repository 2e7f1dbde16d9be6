//! # contact-core: Pure Record Model for Contact Watch
//!
//! This crate holds the data model and the diff algebra of Contact Watch as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Contact Watch Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 contact-watch (binary)                          │   │
//! │  │    CLI ──► config ──► authorization ──► signals ──► exit code   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 contact-sync (engine)                           │   │
//! │  │    RecordStore ──► ChangeCoordinator ──► SyncEmitter ──► stdout │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ contact-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ snapshot  │  │   diff    │  │ validation│  │   │
//! │  │   │  Record   │  │ id set    │  │ ChangeSet │  │   rules   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO ASYNC • NO STORE ACCESS • PURE FUNCTIONS         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `Record`, `LabeledValue`, `ChangeTag`
//! - [`snapshot`] - The committed set of known record identifiers
//! - [`diff`] - `ChangeSet` and the pure snapshot diff
//! - [`error`] - Domain error types
//! - [`validation`] - Record validation rules
//!
//! ## Example Usage
//!
//! ```rust
//! use contact_core::{diff, Snapshot};
//!
//! let old = Snapshot::from_ids(["1", "2", "3"]);
//! let new = Snapshot::from_ids(["2", "3", "4"]);
//!
//! let changes = diff(&old, &new);
//! assert!(changes.added.contains("4"));
//! assert!(changes.deleted.contains("1"));
//! assert_eq!(changes.retained.len(), 2);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod diff;
pub mod error;
pub mod snapshot;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use diff::{diff, ChangeSet};
pub use error::{CoreError, CoreResult, ValidationError};
pub use snapshot::Snapshot;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Fallback display name for a record without any name or organization.
pub const NO_NAME: &str = "[No Name]";

/// Maximum accepted length of a record identifier.
pub const MAX_IDENTIFIER_LEN: usize = 256;
