use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical timestamp assigned to an anchor at the moment it is first recorded.
///
/// A Hybrid Logical Clock value: wall-clock milliseconds, a logical counter
/// for events inside the same millisecond, and the id of the node that
/// stamped it. Values from one clock are strictly increasing.
///
/// Ordering: `physical_ms` → `logical` → `node_id` (total order).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemporalAnchor {
    /// Wall-clock milliseconds since UNIX epoch.
    pub physical_ms: u64,
    /// Logical counter for events at the same physical time.
    pub logical: u32,
    /// Node identifier to break ties between nodes.
    pub node_id: u16,
}

/// Size of [`TemporalAnchor::to_bytes`].
pub const TEMPORAL_ANCHOR_BYTES: usize = 14;

impl TemporalAnchor {
    pub const fn new(physical_ms: u64, logical: u32, node_id: u16) -> Self {
        Self {
            physical_ms,
            logical,
            node_id,
        }
    }

    /// The zero anchor, earlier than every stamped timestamp.
    pub const fn zero() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Fixed-width little-endian encoding used in hash computations.
    pub fn to_bytes(&self) -> [u8; TEMPORAL_ANCHOR_BYTES] {
        let mut out = [0u8; TEMPORAL_ANCHOR_BYTES];
        out[..8].copy_from_slice(&self.physical_ms.to_le_bytes());
        out[8..12].copy_from_slice(&self.logical.to_le_bytes());
        out[12..].copy_from_slice(&self.node_id.to_le_bytes());
        out
    }
}

impl PartialOrd for TemporalAnchor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TemporalAnchor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.physical_ms
            .cmp(&other.physical_ms)
            .then(self.logical.cmp(&other.logical))
            .then(self.node_id.cmp(&other.node_id))
    }
}

impl fmt::Debug for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TemporalAnchor({}ms.{}.n{})",
            self.physical_ms, self.logical, self.node_id
        )
    }
}

impl fmt::Display for TemporalAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.n{}", self.physical_ms, self.logical, self.node_id)
    }
}
