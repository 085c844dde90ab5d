use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use anchor_types::TemporalAnchor;

/// Source of the timestamps stamped on new anchor records.
pub trait Clock: Send + Sync {
    fn now(&self) -> TemporalAnchor;
}

struct HlcState {
    physical_ms: u64,
    logical: u32,
}

/// Hybrid Logical Clock.
///
/// Combines wall-clock milliseconds with a logical counter so that every
/// returned [`TemporalAnchor`] is strictly greater than the previous one,
/// even when the wall clock stalls or steps backwards.
///
/// - `physical = max(wall_clock, last.physical)`
/// - if physical advanced, `logical = 0`; otherwise `logical = last.logical + 1`
pub struct HybridLogicalClock {
    node_id: u16,
    state: Mutex<HlcState>,
}

impl HybridLogicalClock {
    pub fn new(node_id: u16) -> Self {
        Self {
            node_id,
            state: Mutex::new(HlcState {
                physical_ms: 0,
                logical: 0,
            }),
        }
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    fn wall_clock_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

impl Clock for HybridLogicalClock {
    fn now(&self) -> TemporalAnchor {
        let wall = Self::wall_clock_ms();
        // The state is two integers updated together; a panic elsewhere
        // cannot leave it half-written.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let physical = wall.max(state.physical_ms);
        let logical = if physical > state.physical_ms {
            0
        } else {
            state.logical.saturating_add(1)
        };

        state.physical_ms = physical;
        state.logical = logical;
        TemporalAnchor::new(physical, logical, self.node_id)
    }
}

/// Clock that only moves when told to. For tests and deterministic replays.
pub struct ManualClock {
    current: Mutex<TemporalAnchor>,
}

impl ManualClock {
    pub fn new(physical_ms: u64) -> Self {
        Self {
            current: Mutex::new(TemporalAnchor::new(physical_ms, 0, 0)),
        }
    }

    /// Move the clock forward by `ms` milliseconds.
    pub fn advance(&self, ms: u64) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = TemporalAnchor::new(current.physical_ms.saturating_add(ms), 0, current.node_id);
    }

    pub fn set(&self, anchor: TemporalAnchor) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = anchor;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TemporalAnchor {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn hlc_is_strictly_monotonic() {
        let hlc = HybridLogicalClock::new(1);
        let mut prev = hlc.now();
        for _ in 0..1000 {
            let next = hlc.now();
            assert!(next > prev, "{prev} >= {next}");
            prev = next;
        }
    }

    #[test]
    fn hlc_counts_logically_when_wall_clock_is_behind() {
        let hlc = HybridLogicalClock::new(3);
        {
            let mut state = hlc.state.lock().unwrap();
            state.physical_ms = u64::MAX;
            state.logical = 0;
        }
        let t1 = hlc.now();
        let t2 = hlc.now();
        assert_eq!((t1.physical_ms, t1.logical), (u64::MAX, 1));
        assert_eq!(t2.logical, 2);
        assert_eq!(t2.node_id, 3);
        assert_eq!(hlc.node_id(), 3);
    }

    #[test]
    fn hlc_unique_across_threads() {
        let hlc = Arc::new(HybridLogicalClock::new(1));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let hlc = Arc::clone(&hlc);
                thread::spawn(move || (0..100).map(|_| hlc.now()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<TemporalAnchor> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        let len = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), len);
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now(), clock.now());
        clock.advance(5);
        assert_eq!(clock.now().physical_ms, 1_005);
        clock.set(TemporalAnchor::new(7, 2, 9));
        assert_eq!(clock.now(), TemporalAnchor::new(7, 2, 9));
    }
}
