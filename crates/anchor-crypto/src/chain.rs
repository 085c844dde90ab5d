use crate::hasher::ContentHasher;

/// An entry that participates in a hash chain.
pub trait ChainLinked {
    /// The entry's own chain hash.
    fn chain_hash(&self) -> [u8; 32];
    /// The previous entry's chain hash (None for the first entry).
    fn prev_hash(&self) -> Option<[u8; 32]>;
    /// Canonical payload bytes covered by the chain hash.
    fn payload_bytes(&self) -> Vec<u8>;
}

/// Hash chain integrity verifier for the anchor audit trail.
///
/// A valid chain links every entry to its predecessor's hash and carries a
/// hash that matches `BLAKE3(domain || prev_hash? || payload)`. Rewriting,
/// removing, or reordering any entry breaks the chain from that point on.
pub struct HashChainVerifier;

impl HashChainVerifier {
    /// Verify a chain that starts at the genesis entry.
    pub fn verify_chain(entries: &[impl ChainLinked]) -> Result<(), ChainError> {
        Self::verify_from(None, entries)
    }

    /// Verify a chain segment whose first entry must link to `anchor`.
    ///
    /// `anchor` is `None` when the segment starts at genesis.
    pub fn verify_from(
        anchor: Option<[u8; 32]>,
        entries: &[impl ChainLinked],
    ) -> Result<(), ChainError> {
        let mut expected_prev = anchor;

        for (index, entry) in entries.iter().enumerate() {
            match (expected_prev, entry.prev_hash()) {
                (None, Some(_)) => return Err(ChainError::GenesisHasPrevHash),
                (Some(_), None) => return Err(ChainError::MissingPrevHash { index }),
                (Some(expected), Some(prev)) if expected != prev => {
                    return Err(ChainError::BrokenLink { index })
                }
                _ => {}
            }

            let computed = Self::compute_hash(&entry.payload_bytes(), expected_prev);
            if computed != entry.chain_hash() {
                return Err(ChainError::HashMismatch { index });
            }
            expected_prev = Some(computed);
        }

        Ok(())
    }

    /// Compute the chain hash for a payload and optional previous hash.
    pub fn compute_hash(payload: &[u8], prev_hash: Option<[u8; 32]>) -> [u8; 32] {
        match prev_hash {
            Some(prev) => ContentHasher::EVENT.hash_parts(&[&prev, payload]),
            None => ContentHasher::EVENT.hash(payload),
        }
    }
}

/// Errors from chain verification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("genesis entry has a previous hash (should be None)")]
    GenesisHasPrevHash,

    #[error("broken link at index {index}: prev_hash does not match")]
    BrokenLink { index: usize },

    #[error("missing prev_hash at index {index} (should reference previous entry)")]
    MissingPrevHash { index: usize },

    #[error("hash mismatch at index {index}: computed hash differs from stored")]
    HashMismatch { index: usize },
}
