use anchor_crypto::{ChainLinked, HashChainVerifier};
use anchor_types::{AnchorHash, AnchorRecord, SubmitterId, TemporalAnchor};
use serde::{Deserialize, Serialize};

/// A single entry of the anchor audit trail.
///
/// Emitted exactly once per newly created [`AnchorRecord`], carrying the
/// record's fields plus its position in the global order. `event_hash`
/// covers the payload and the previous event's hash, so any rewrite of
/// history is detectable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorEvent {
    /// Position in the log, starting at 0 with no gaps.
    pub sequence: u64,
    pub hash: AnchorHash,
    pub submitter: SubmitterId,
    pub timestamp: TemporalAnchor,
    /// `event_hash` of the previous event; `None` for sequence 0.
    pub prev_hash: Option<[u8; 32]>,
    pub event_hash: [u8; 32],
}

impl AnchorEvent {
    /// Build the event for `record` at `sequence`, chained to `prev_hash`.
    pub fn new(sequence: u64, record: &AnchorRecord, prev_hash: Option<[u8; 32]>) -> Self {
        let payload = payload_bytes(
            sequence,
            &record.hash,
            &record.anchored_by,
            &record.anchored_at,
        );
        Self {
            sequence,
            hash: record.hash,
            submitter: record.anchored_by.clone(),
            timestamp: record.anchored_at,
            prev_hash,
            event_hash: HashChainVerifier::compute_hash(&payload, prev_hash),
        }
    }

    /// The record this event announced.
    pub fn record(&self) -> AnchorRecord {
        AnchorRecord::new(self.hash, self.submitter.clone(), self.timestamp)
    }

    /// Whether `event_hash` matches the event's own content and link.
    pub fn verify_integrity(&self) -> bool {
        HashChainVerifier::compute_hash(&self.payload_bytes(), self.prev_hash) == self.event_hash
    }
}

/// Length-prefixed canonical encoding of the hashed event fields.
fn payload_bytes(
    sequence: u64,
    hash: &AnchorHash,
    submitter: &SubmitterId,
    timestamp: &TemporalAnchor,
) -> Vec<u8> {
    let submitter = submitter.as_str().as_bytes();
    let mut out = Vec::with_capacity(8 + 32 + 8 + submitter.len() + 14);
    out.extend_from_slice(&sequence.to_le_bytes());
    out.extend_from_slice(hash.as_bytes());
    out.extend_from_slice(&(submitter.len() as u64).to_le_bytes());
    out.extend_from_slice(submitter);
    out.extend_from_slice(&timestamp.to_bytes());
    out
}

impl ChainLinked for AnchorEvent {
    fn chain_hash(&self) -> [u8; 32] {
        self.event_hash
    }

    fn prev_hash(&self) -> Option<[u8; 32]> {
        self.prev_hash
    }

    fn payload_bytes(&self) -> Vec<u8> {
        payload_bytes(self.sequence, &self.hash, &self.submitter, &self.timestamp)
    }
}
