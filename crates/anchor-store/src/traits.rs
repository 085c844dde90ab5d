use anchor_types::{AnchorHash, AnchorRecord};

use crate::error::StoreResult;

/// Failure reported by a [`CommitHook`].
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Work that must happen inside a record's commit: after the record is
/// durable and before any reader can see it.
pub type CommitHook<'a> = &'a mut dyn FnMut(&AnchorRecord) -> Result<(), HookError>;

/// Outcome of [`AnchorStore::try_insert_with`].
#[derive(Debug)]
pub enum InsertOutcome {
    /// The record was committed and the hook succeeded.
    Inserted,
    /// A record already existed; nothing changed and the hook did not run.
    Exists,
    /// The record was committed but the hook failed.
    HookFailed(HookError),
}

impl InsertOutcome {
    /// Whether this call committed the record.
    pub fn is_inserted(&self) -> bool {
        !matches!(self, Self::Exists)
    }
}

/// Durable, write-once mapping from hash to anchor record.
///
/// All implementations must satisfy these invariants:
/// - At most one record ever exists per hash; it is never replaced or removed.
/// - `try_insert_with` is atomic per hash: among concurrent callers for the
///   same hash exactly one commits, and only that caller's hook runs.
/// - A committed record is visible only after its hook has returned.
/// - `get` has no side effects and never waits on writes to other hashes
///   beyond the backend's shard granularity.
/// - Failures of the durable medium are returned, never swallowed.
pub trait AnchorStore: Send + Sync {
    /// Insert `record` under `record.hash` if no record exists for that hash,
    /// running `hook` while the hash is still locked against other writers
    /// and readers.
    ///
    /// The record is committed even if the hook fails; the failure comes
    /// back as [`InsertOutcome::HookFailed`]. Storage errors abort the insert
    /// before the hook runs.
    fn try_insert_with(
        &self,
        record: &AnchorRecord,
        hook: CommitHook<'_>,
    ) -> StoreResult<InsertOutcome>;

    /// Insert `record` if no record exists for its hash.
    ///
    /// Returns `true` if this call performed the insert and `false` if a
    /// record already existed, in which case nothing changes.
    fn try_insert(&self, record: &AnchorRecord) -> StoreResult<bool> {
        Ok(self.try_insert_with(record, &mut |_| Ok(()))?.is_inserted())
    }

    /// Look up the record for a hash.
    fn get(&self, hash: &AnchorHash) -> StoreResult<Option<AnchorRecord>>;

    /// Whether a record exists for a hash.
    fn contains(&self, hash: &AnchorHash) -> StoreResult<bool> {
        Ok(self.get(hash)?.is_some())
    }

    /// Number of records held.
    fn len(&self) -> StoreResult<usize>;

    /// Returns `true` if the store holds no records.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// All records, ordered by `anchored_at` and then by hash.
    fn records(&self) -> StoreResult<Vec<AnchorRecord>>;
}
