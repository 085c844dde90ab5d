use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};

use anchor_types::{AnchorHash, AnchorRecord};
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::traits::{AnchorStore, CommitHook, InsertOutcome};

/// Default number of lock shards.
pub const DEFAULT_SHARDS: usize = 16;

type Shard = RwLock<HashMap<AnchorHash, AnchorRecord>>;

/// Hash-sharded record map shared by the in-memory and file backends.
///
/// Each shard sits behind its own `RwLock`, so readers never block each
/// other and writers only contend with traffic on the same shard. The
/// shard of a hash is fixed by its leading bytes.
pub struct ShardedIndex {
    shards: Vec<Shard>,
}

impl ShardedIndex {
    /// Create an empty index with `shards` lock shards (at least one).
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    /// Number of lock shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, hash: &AnchorHash) -> &Shard {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&hash.as_bytes()[..8]);
        let index = u64::from_le_bytes(prefix) % self.shards.len() as u64;
        &self.shards[index as usize]
    }

    fn lock_for_write(
        &self,
        hash: &AnchorHash,
    ) -> StoreResult<RwLockWriteGuard<'_, HashMap<AnchorHash, AnchorRecord>>> {
        self.shard(hash)
            .write()
            .map_err(|_| StoreError::poisoned("shard"))
    }

    pub fn get(&self, hash: &AnchorHash) -> StoreResult<Option<AnchorRecord>> {
        let shard = self
            .shard(hash)
            .read()
            .map_err(|_| StoreError::poisoned("shard"))?;
        Ok(shard.get(hash).cloned())
    }

    /// Commit `record` if its hash is absent.
    ///
    /// The shard write lock is held from the absence check until the record
    /// is in the map, so `persist` and then `hook` run before any reader of
    /// the shard can see the record, and no other writer of the hash can
    /// get in between. Once `persist` succeeds the record is committed,
    /// whatever the hook returns.
    pub fn insert_with(
        &self,
        record: &AnchorRecord,
        persist: impl FnOnce(&AnchorRecord) -> StoreResult<()>,
        hook: CommitHook<'_>,
    ) -> StoreResult<InsertOutcome> {
        let mut shard = self.lock_for_write(&record.hash)?;
        if shard.contains_key(&record.hash) {
            return Ok(InsertOutcome::Exists);
        }
        persist(record)?;
        let outcome = match hook(record) {
            Ok(()) => InsertOutcome::Inserted,
            Err(e) => {
                warn!(hash = %record.hash, error = %e, "record committed but commit hook failed");
                InsertOutcome::HookFailed(e)
            }
        };
        shard.insert(record.hash, record.clone());
        Ok(outcome)
    }

    /// Insert if absent. Returns `true` if inserted.
    pub fn insert_if_absent(&self, record: &AnchorRecord) -> StoreResult<bool> {
        let mut shard = self.lock_for_write(&record.hash)?;
        if shard.contains_key(&record.hash) {
            return Ok(false);
        }
        shard.insert(record.hash, record.clone());
        Ok(true)
    }

    pub fn len(&self) -> StoreResult<usize> {
        let mut total = 0;
        for shard in &self.shards {
            total += shard.read().map_err(|_| StoreError::poisoned("shard"))?.len();
        }
        Ok(total)
    }

    /// All records ordered by `anchored_at`, ties broken by hash.
    pub fn records(&self) -> StoreResult<Vec<AnchorRecord>> {
        let mut all = Vec::new();
        for shard in &self.shards {
            let shard = shard.read().map_err(|_| StoreError::poisoned("shard"))?;
            all.extend(shard.values().cloned());
        }
        all.sort_by(|a, b| {
            a.anchored_at
                .cmp(&b.anchored_at)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        Ok(all)
    }
}

impl Default for ShardedIndex {
    fn default() -> Self {
        Self::new(DEFAULT_SHARDS)
    }
}

/// In-memory anchor store.
///
/// Intended for tests, embedding, and replay targets. Records are cloned on
/// read and write.
#[derive(Default)]
pub struct InMemoryAnchorStore {
    index: ShardedIndex,
}

impl InMemoryAnchorStore {
    /// Create an empty store with the default shard count.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store with a specific shard count.
    pub fn with_shards(shards: usize) -> Self {
        Self {
            index: ShardedIndex::new(shards),
        }
    }
}

impl AnchorStore for InMemoryAnchorStore {
    fn try_insert_with(
        &self,
        record: &AnchorRecord,
        hook: CommitHook<'_>,
    ) -> StoreResult<InsertOutcome> {
        self.index.insert_with(record, |_| Ok(()), hook)
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

impl std::fmt::Debug for InMemoryAnchorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAnchorStore")
            .field("shards", &self.index.shard_count())
            .field("record_count", &self.index.len().unwrap_or_default())
            .finish()
    }
}
