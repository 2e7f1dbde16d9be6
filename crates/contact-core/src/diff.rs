//! # Snapshot Diff
//!
//! Reconstructs what happened to the directory from two id sets, because the
//! upstream change signal carries no identity of its own.
//!
//! ## Partition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        diff(old, new)                                   │
//! │                                                                         │
//! │        old                               new                            │
//! │   ┌─────────────┬───────────────────┬─────────────┐                    │
//! │   │   deleted   │     retained      │    added    │                    │
//! │   │  old − new  │    old ∩ new      │  new − old  │                    │
//! │   └─────────────┴───────────────────┴─────────────┘                    │
//! │                                                                         │
//! │  retained = "potentially modified": the signal cannot tell an          │
//! │  untouched record from an edited one, so every retained record is      │
//! │  refetched and re-emitted whenever the ChangeSet is non-empty.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use crate::snapshot::Snapshot;
use crate::types::{ChangeTag, RecordId};

/// Added / deleted / retained partition of two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// In `new` only.
    pub added: BTreeSet<RecordId>,
    /// In `old` only.
    pub deleted: BTreeSet<RecordId>,
    /// In both; treated as modified.
    pub retained: BTreeSet<RecordId>,
}

impl ChangeSet {
    /// True when `added ∪ deleted ∪ retained` is empty, i.e. both snapshots
    /// were empty. Only then does a cycle emit nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.retained.is_empty()
    }

    /// True when membership changed (something was added or deleted).
    pub fn has_membership_changes(&self) -> bool {
        !self.added.is_empty() || !self.deleted.is_empty()
    }

    /// Ids whose full records must be fetched: `added ∪ retained`.
    pub fn affected(&self) -> BTreeSet<RecordId> {
        self.added.union(&self.retained).cloned().collect()
    }

    /// Tag for an id from `affected()`; `None` for ids outside it.
    pub fn tag_for(&self, id: &str) -> Option<ChangeTag> {
        if self.added.contains(id) {
            Some(ChangeTag::Added)
        } else if self.retained.contains(id) {
            Some(ChangeTag::Modified)
        } else {
            None
        }
    }
}

/// Computes the partition of `old` and `new`.
///
/// Pure and order-independent: the result depends only on set membership.
pub fn diff(old: &Snapshot, new: &Snapshot) -> ChangeSet {
    let old = old.ids();
    let new = new.ids();

    ChangeSet {
        added: new.difference(old).cloned().collect(),
        deleted: old.difference(new).cloned().collect(),
        retained: old.intersection(new).cloned().collect(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
