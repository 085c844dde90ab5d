use std::path::Path;

use anchor_types::{AnchorHash, AnchorRecord};
use tracing::{debug, info, warn};

use crate::error::StoreResult;
use crate::memory::ShardedIndex;
use crate::traits::{AnchorStore, CommitHook, InsertOutcome};
use crate::wal::{WalConfig, WriteAheadLog};

/// Durable anchor store: a sharded in-memory index in front of an
/// append-only record file.
///
/// A record is appended to the file while its shard's write lock is held,
/// then the commit hook runs, and only then is the record inserted into the
/// index. A record that is visible to readers is always on disk. Opening the store replays the file into the index.
pub struct FileAnchorStore {
    index: ShardedIndex,
    wal: WriteAheadLog<AnchorRecord>,
}

impl FileAnchorStore {
    /// Open (or create) the store backed by the file at `path`.
    pub fn open(path: &Path, shards: usize, config: WalConfig) -> StoreResult<Self> {
        let wal = WriteAheadLog::open(path, config)?;
        let index = ShardedIndex::new(shards);

        let mut recovered = 0usize;
        for record in wal.recover()? {
            if index.insert_if_absent(&record)? {
                recovered += 1;
            } else {
                warn!(hash = %record.hash, "duplicate record in store file; keeping first");
            }
        }

        info!(path = %path.display(), records = recovered, "anchor store opened");
        Ok(Self { index, wal })
    }

    pub fn path(&self) -> &Path {
        self.wal.path()
    }
}

impl AnchorStore for FileAnchorStore {
    fn try_insert_with(
        &self,
        record: &AnchorRecord,
        hook: CommitHook<'_>,
    ) -> StoreResult<InsertOutcome> {
        // A failed append leaves no visible trace and skips the hook.
        self.index.insert_with(
            record,
            |record| {
                self.wal.append(record)?;
                debug!(hash = %record.hash, "record persisted");
                Ok(())
            },
            hook,
        )
    }

    fn get(&self, hash: &AnchorHash) -> StoreResult<Option<AnchorRecord>> {
        self.index.get(hash)
    }

    fn len(&self) -> StoreResult<usize> {
        self.index.len()
    }

    fn records(&self) -> StoreResult<Vec<AnchorRecord>> {
        self.index.records()
    }
}

impl std::fmt::Debug for FileAnchorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAnchorStore")
            .field("path", &self.wal.path())
            .field("record_count", &self.index.len().unwrap_or_default())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::DEFAULT_SHARDS;
    use anchor_types::{SubmitterId, TemporalAnchor};
    use std::sync::Arc;
    use std::thread;

    fn record(seed: u8, who: &str) -> AnchorRecord {
        AnchorRecord::new(
            AnchorHash::from_array([seed; 32]),
            SubmitterId::new(who).unwrap(),
            TemporalAnchor::new(1_000 + seed as u64, 0, 1),
        )
    }

    fn open(path: &Path) -> FileAnchorStore {
        FileAnchorStore::open(path, DEFAULT_SHARDS, WalConfig::default()).unwrap()
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.wal");

        let store = open(&path);
        assert!(store.try_insert(&record(1, "alice")).unwrap());
        assert!(store.try_insert(&record(2, "bob")).unwrap());
        drop(store);

        let store = open(&path);
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(
            store.get(&AnchorHash::from_array([1; 32])).unwrap(),
            Some(record(1, "alice"))
        );
    }

    #[test]
    fn rejected_insert_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.wal");

        let store = open(&path);
        assert!(store.try_insert(&record(1, "alice")).unwrap());
        let end = store.wal.offset().unwrap();
        assert!(!store.try_insert(&record(1, "mallory")).unwrap());
        assert_eq!(store.wal.offset().unwrap(), end);
        drop(store);

        let store = open(&path);
        let kept = store.get(&AnchorHash::from_array([1; 32])).unwrap().unwrap();
        assert_eq!(kept.anchored_by.as_str(), "alice");
    }

    #[test]
    fn hook_runs_after_the_record_is_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.wal");
        let store = open(&path);

        let mut seen_on_disk = None;
        let outcome = store
            .try_insert_with(&record(2, "alice"), &mut |_| {
                seen_on_disk = Some(std::fs::metadata(&path)?.len());
                Ok(())
            })
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::Inserted));
        assert_eq!(seen_on_disk, Some(store.wal.offset().unwrap()));
        assert!(seen_on_disk.unwrap() > 0);
    }

    #[test]
    fn failed_hook_keeps_the_persisted_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.wal");

        let store = open(&path);
        let outcome = store
            .try_insert_with(&record(6, "alice"), &mut |_| Err("event log offline".into()))
            .unwrap();
        assert!(matches!(outcome, InsertOutcome::HookFailed(_)));
        assert!(store.contains(&AnchorHash::from_array([6; 32])).unwrap());
        drop(store);

        let store = open(&path);
        assert_eq!(
            store.get(&AnchorHash::from_array([6; 32])).unwrap(),
            Some(record(6, "alice"))
        );
    }

    #[test]
    fn concurrent_duplicates_write_one_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.wal");
        let store = Arc::new(open(&path));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.try_insert(&record(5, &format!("s{i}"))).unwrap())
            })
            .collect();
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(store.wal.recover().unwrap().len(), 1);
    }

    #[test]
    fn records_are_time_ordered_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.wal");
        let store = open(&path);
        for seed in [3u8, 1, 2] {
            store.try_insert(&record(seed, "s")).unwrap();
        }
        drop(store);

        let seeds: Vec<u8> = open(&path)
            .records()
            .unwrap()
            .iter()
            .map(|r| r.hash.as_bytes()[0])
            .collect();
        assert_eq!(seeds, vec![1, 2, 3]);
    }
}
