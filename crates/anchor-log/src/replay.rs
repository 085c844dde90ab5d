use std::collections::HashMap;

use anchor_crypto::HashChainVerifier;
use anchor_store::{AnchorStore, InMemoryAnchorStore};
use anchor_types::AnchorHash;
use tracing::debug;

use crate::error::{LogError, LogResult};
use crate::event::AnchorEvent;

/// Outcome of replaying events into a store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayResult {
    /// Events whose record was inserted by the replay.
    pub applied: u64,
    /// Events whose hash the target already held.
    pub skipped: u64,
    /// Sequence following the last replayed event.
    pub next_sequence: u64,
}

/// Deterministic verification and replay of the anchor event stream.
pub struct ReplayEngine;

impl ReplayEngine {
    /// Check that `events` is a complete log from sequence 0: contiguous,
    /// free of repeated hashes, and hash-chained end to end.
    pub fn verify(events: &[AnchorEvent]) -> LogResult<()> {
        let mut seen: HashMap<AnchorHash, u64> = HashMap::with_capacity(events.len());
        for (expected, event) in (0u64..).zip(events) {
            if event.sequence != expected {
                return Err(LogError::SequenceGap {
                    expected,
                    found: event.sequence,
                });
            }
            if let Some(&first) = seen.get(&event.hash) {
                return Err(LogError::DuplicateHash {
                    hash: event.hash.to_hex(),
                    first,
                    second: event.sequence,
                });
            }
            seen.insert(event.hash, event.sequence);
        }
        HashChainVerifier::verify_chain(events)?;
        Ok(())
    }

    /// Apply `events` in order to `target`, inserting each record that is
    /// not already present. Replaying the same events twice is a no-op the
    /// second time.
    pub fn replay(events: &[AnchorEvent], target: &dyn AnchorStore) -> LogResult<ReplayResult> {
        let mut result = ReplayResult::default();
        for event in events {
            if target.try_insert(&event.record())? {
                result.applied += 1;
            } else {
                result.skipped += 1;
            }
            result.next_sequence = event.sequence + 1;
        }
        debug!(
            applied = result.applied,
            skipped = result.skipped,
            "replay complete"
        );
        Ok(result)
    }

    /// Verify `events` and rebuild the record set they describe from nothing.
    pub fn rebuild(events: &[AnchorEvent]) -> LogResult<InMemoryAnchorStore> {
        Self::verify(events)?;
        let store = InMemoryAnchorStore::new();
        Self::replay(events, &store)?;
        Ok(store)
    }
}
