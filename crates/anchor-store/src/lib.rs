//! Durable, idempotent hash-to-record storage for the anchor registry.
//!
//! The store maps each [`AnchorHash`](anchor_types::AnchorHash) to at most one
//! [`AnchorRecord`](anchor_types::AnchorRecord). It is the leaf of the
//! registry: it knows nothing about events, clocks, or callers.
//!
//! # Storage Backends
//!
//! All backends implement the [`AnchorStore`] trait:
//!
//! - [`InMemoryAnchorStore`] -- sharded `HashMap` store for tests and embedding
//! - [`FileAnchorStore`] -- sharded index backed by an append-only record file
//!
//! # Design Rules
//!
//! 1. Records are write-once: no update or delete path exists.
//! 2. `try_insert` is atomic per hash; exactly one concurrent caller wins.
//! 3. Writes and reads for different shards never contend.
//! 4. Durable backends persist a record before it becomes visible.
//! 5. A commit hook runs after persistence and before visibility, so work
//!    tied to a record (such as its event) is done before anyone can see it.
//! 6. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;
pub mod wal;

pub use error::{StoreError, StoreResult};
pub use file::FileAnchorStore;
pub use memory::{InMemoryAnchorStore, ShardedIndex, DEFAULT_SHARDS};
pub use traits::{AnchorStore, CommitHook, HookError, InsertOutcome};
pub use wal::{SyncMode, WalConfig, WriteAheadLog};
