//! # Directory Store
//!
//! A `RecordStore` backed by a directory of native contact documents.
//!
//! ## Layout
//! ```text
//! contacts/
//! ├── 410FE041-5C4E-48DA-B4DE-04C15EA3DBAC.json   one native document
//! ├── grace-hopper.json                         identifier falls back to stem
//! └── notes.txt                                 ignored (not *.json)
//! ```
//!
//! ## Authorization Mapping
//! ```text
//! ┌──────────────────────────────┬───────────────────────────────────────┐
//! │ Directory                    │ AccessStatus                          │
//! ├──────────────────────────────┼───────────────────────────────────────┤
//! │ exists and is listable       │ Granted                               │
//! │ missing                      │ NotDetermined (request may create it) │
//! │ permission denied            │ Denied                                │
//! │ not a directory / other I/O  │ Restricted                            │
//! └──────────────────────────────┴───────────────────────────────────────┘
//! ```
//!
//! A document that is present but cannot be read or parsed fails the whole
//! fetch; one that parses but fails formatting is skipped.
//!
//! Change subscription uses the platform's recommended `notify` watcher.
//! Every filesystem event in the directory becomes one coarse wake-up.

use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use contact_core::{Record, RecordId};

use crate::error::{SyncError, SyncResult};
use crate::formatter::{format_all, JsonContactFormatter, NativeContact};
use crate::store::{AccessStatus, RecordStore, Subscription, WakeSignal};

/// File extension of native documents.
pub const DOCUMENT_EXTENSION: &str = "json";

/// Record store reading `*.json` documents from one directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    create_if_missing: bool,
    formatter: JsonContactFormatter,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, create_if_missing: bool) -> Self {
        DirectoryStore {
            root: root.into(),
            create_if_missing,
            formatter: JsonContactFormatter,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_document(path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()) == Some(DOCUMENT_EXTENSION)
    }

    /// Lists document paths in name order.
    async fn document_paths(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut paths = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if Self::is_document(&path) && entry.file_type().await?.is_file() {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }

    /// Reads and parses one document.
    ///
    /// A file that vanished after listing is `None`. A file that is present
    /// but unreadable or malformed (often caught mid-write) fails the whole
    /// fetch, so it never shows up as a deletion.
    async fn load_document(&self, path: &Path) -> SyncResult<Option<NativeContact>> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Document removed during fetch");
                return Ok(None);
            }
            Err(e) => {
                return Err(SyncError::FetchFailed(format!("{}: {}", path.display(), e)));
            }
        };

        NativeContact::from_json(&contents, &stem)
            .map(Some)
            .map_err(|e| SyncError::FetchFailed(format!("{}: {}", path.display(), e)))
    }

    /// Loads every document, keyed by identifier.
    ///
    /// Documents that parse but fail formatting are skipped. When two files
    /// claim the same identifier the first in name order wins.
    async fn load_all(&self) -> SyncResult<BTreeMap<RecordId, Record>> {
        let paths = self
            .document_paths()
            .await
            .map_err(|e| SyncError::FetchFailed(format!("{}: {}", self.root.display(), e)))?;

        let mut natives = Vec::with_capacity(paths.len());
        for path in &paths {
            if let Some(native) = self.load_document(path).await? {
                natives.push(native);
            }
        }

        let mut records = BTreeMap::new();
        for record in format_all(&self.formatter, &natives) {
            if records.contains_key(&record.identifier) {
                warn!(
                    identifier = %record.identifier,
                    "Duplicate identifier, keeping first document"
                );
                continue;
            }
            records.insert(record.identifier.clone(), record);
        }

        Ok(records)
    }
}

#[async_trait]
impl RecordStore for DirectoryStore {
    async fn authorization_status(&self) -> AccessStatus {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => match tokio::fs::read_dir(&self.root).await {
                Ok(_) => AccessStatus::Granted,
                Err(e) if e.kind() == ErrorKind::PermissionDenied => AccessStatus::Denied,
                Err(e) => {
                    warn!(path = %self.root.display(), error = %e, "Directory not listable");
                    AccessStatus::Restricted
                }
            },
            Ok(_) => {
                warn!(path = %self.root.display(), "Store path is not a directory");
                AccessStatus::Restricted
            }
            Err(e) if e.kind() == ErrorKind::NotFound => AccessStatus::NotDetermined,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => AccessStatus::Denied,
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "Cannot inspect store path");
                AccessStatus::Restricted
            }
        }
    }

    async fn request_access(&self) -> SyncResult<AccessStatus> {
        let status = self.authorization_status().await;
        if status != AccessStatus::NotDetermined {
            return Ok(status);
        }

        if !self.create_if_missing {
            info!(path = %self.root.display(), "Store directory missing and creation disabled");
            return Ok(AccessStatus::Denied);
        }

        match tokio::fs::create_dir_all(&self.root).await {
            Ok(()) => {
                info!(path = %self.root.display(), "Created store directory");
                Ok(self.authorization_status().await)
            }
            Err(e) => {
                warn!(path = %self.root.display(), error = %e, "Failed to create store directory");
                Ok(AccessStatus::Denied)
            }
        }
    }

    async fn fetch_all(&self) -> SyncResult<Vec<Record>> {
        let records = self.load_all().await?;

        debug!(count = records.len(), "Fetched all records");
        Ok(records.into_values().collect())
    }

    async fn fetch_by_ids(&self, ids: &BTreeSet<RecordId>) -> Vec<Record> {
        let mut records = match self.load_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Store unreadable, no records fetched");
                return Vec::new();
            }
        };

        ids.iter()
            .filter_map(|id| {
                let record = records.remove(id);
                if record.is_none() {
                    debug!(identifier = %id, "Record not found, skipping");
                }
                record
            })
            .collect()
    }

    fn subscribe(&self, wake: WakeSignal) -> SyncResult<Subscription> {
        let root = self.root.clone();

        let mut watcher = RecommendedWatcher::new(
            move |result: notify::Result<Event>| match result {
                Ok(event) => {
                    if !matches!(event.kind, EventKind::Access(_)) {
                        wake.wake();
                    }
                }
                Err(e) => warn!(error = %e, "Directory watcher error"),
            },
            Config::default(),
        )?;
        watcher.watch(&root, RecursiveMode::NonRecursive)?;

        info!(path = %root.display(), "Watching store directory");
        Ok(Subscription::new(move || {
            if let Err(e) = watcher.unwatch(&root) {
                debug!(error = %e, "Unwatch failed");
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_doc(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_all_reads_documents() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "a.json", r#"{"identifier":"A","givenName":"Ada"}"#);
        write_doc(dir.path(), "grace.json", r#"{"familyName":"Hopper","nickname":"x"}"#);
        write_doc(dir.path(), "readme.txt", "ignored");

        let store = DirectoryStore::new(dir.path(), false);
        let mut records = store.fetch_all().await.unwrap();
        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));

        let ids: Vec<&str> = records.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["A", "grace"]);
    }

    #[tokio::test]
    async fn test_malformed_document_fails_fetch() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "a.json", r#"{"identifier":"A"}"#);
        write_doc(dir.path(), "b.json", r#"{"identifier":"B","giv"#);

        let store = DirectoryStore::new(dir.path(), false);
        let err = store.fetch_all().await.unwrap_err();
        assert!(matches!(err, SyncError::FetchFailed(_)));
        assert!(err.to_string().contains("b.json"));
    }

    #[tokio::test]
    async fn test_invalid_content_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "a.json", r#"{"identifier":"A"}"#);
        write_doc(dir.path(), "b.json", r#"{"identifier":"B","phoneNumbers":[{"label":"home"}]}"#);

        let records = DirectoryStore::new(dir.path(), false).fetch_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier, "A");
    }

    #[tokio::test]
    async fn test_duplicate_identifier_keeps_first() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "1.json", r#"{"identifier":"dup","note":"first"}"#);
        write_doc(dir.path(), "2.json", r#"{"identifier":"dup","note":"second"}"#);

        let records = DirectoryStore::new(dir.path(), false).fetch_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].note.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn test_fetch_by_ids_omits_unknown() {
        let dir = tempfile::tempdir().unwrap();
        write_doc(dir.path(), "a.json", r#"{"identifier":"A"}"#);

        let store = DirectoryStore::new(dir.path(), false);
        let ids: BTreeSet<RecordId> = ["A".to_string(), "B".to_string()].into();
        let records = store.fetch_by_ids(&ids).await;
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_authorization_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("contacts");

        let store = DirectoryStore::new(&missing, false);
        assert_eq!(store.authorization_status().await, AccessStatus::NotDetermined);
        assert_eq!(store.request_access().await.unwrap(), AccessStatus::Denied);
        assert!(store.fetch_all().await.is_err());

        let store = DirectoryStore::new(&missing, true);
        assert_eq!(store.request_access().await.unwrap(), AccessStatus::Granted);
        assert!(store.fetch_all().await.unwrap().is_empty());

        write_doc(dir.path(), "file.json", "{}");
        let store = DirectoryStore::new(dir.path().join("file.json"), true);
        assert_eq!(store.authorization_status().await, AccessStatus::Restricted);
    }

    #[tokio::test]
    async fn test_subscription_wakes_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path(), false);

        let (wake, mut rx) = WakeSignal::channel();
        let _subscription = store.subscribe(wake).unwrap();

        write_doc(dir.path(), "new.json", r#"{"identifier":"new"}"#);

        let woke = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(woke, Ok(Some(()))));
    }
}
