//! # Snapshot
//!
//! The set of record identifiers known as of the last committed sync cycle.
//!
//! A `Snapshot` is a labeled id set and nothing more: it never carries record
//! content, and building one from a record list dedupes by identifier.

use std::collections::BTreeSet;

use crate::types::{Record, RecordId};

/// Known record identifiers at a point in the cycle timeline.
///
/// Backed by a `BTreeSet` so iteration (and therefore every frame built from
/// it) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    ids: BTreeSet<RecordId>,
}

impl Snapshot {
    /// An empty snapshot (no records known yet).
    pub fn empty() -> Self {
        Self::default()
    }

    /// `Ids(records)`: the identifier set of a record list.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        Snapshot {
            ids: records.into_iter().map(|r| r.identifier.clone()).collect(),
        }
    }

    /// Builds a snapshot from raw identifiers.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<RecordId>,
    {
        Snapshot {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordId> {
        self.ids.iter()
    }

    /// Borrow the underlying id set.
    pub fn ids(&self) -> &BTreeSet<RecordId> {
        &self.ids
    }

    /// Consume into the underlying id set.
    pub fn into_ids(self) -> BTreeSet<RecordId> {
        self.ids
    }
}

impl FromIterator<RecordId> for Snapshot {
    fn from_iter<T: IntoIterator<Item = RecordId>>(iter: T) -> Self {
        Snapshot {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_dedupes() {
        let records = vec![Record::new("a"), Record::new("b"), Record::new("a")];
        let snapshot = Snapshot::from_records(&records);

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("a"));
        assert!(snapshot.contains("b"));
    }

    #[test]
    fn test_iteration_is_sorted() {
        let snapshot = Snapshot::from_ids(["c", "a", "b"]);
        let ids: Vec<&str> = snapshot.iter().map(String::as_str).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_empty() {
        assert!(Snapshot::empty().is_empty());
        assert_eq!(Snapshot::from_records(&[]), Snapshot::empty());
    }
}
