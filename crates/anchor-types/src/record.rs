use serde::{Deserialize, Serialize};

use crate::hash::AnchorHash;
use crate::submitter::SubmitterId;
use crate::temporal::TemporalAnchor;

/// The durable fact that a hash was anchored.
///
/// Write-once per hash: the first successful anchor creates it and nothing
/// ever updates or removes it afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub hash: AnchorHash,
    pub anchored_by: SubmitterId,
    pub anchored_at: TemporalAnchor,
}

impl AnchorRecord {
    pub fn new(hash: AnchorHash, anchored_by: SubmitterId, anchored_at: TemporalAnchor) -> Self {
        Self {
            hash,
            anchored_by,
            anchored_at,
        }
    }
}
