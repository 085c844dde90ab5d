use std::collections::HashMap;
use std::sync::Arc;

use anchor_crypto::fingerprint_json;
use anchor_log::{AnchorEvent, AnchorEventLog, EventLog, EventSubscription, ReplayEngine};
use anchor_store::{AnchorStore, FileAnchorStore, InMemoryAnchorStore, InsertOutcome};
use anchor_types::{AnchorHash, AnchorRecord, SubmitterId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, HybridLogicalClock};
use crate::config::RegistryConfig;
use crate::error::{ServiceError, ServiceResult};

/// Outcome of a successful [`AnchorService::anchor`] call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorResult {
    /// `true` iff this call created the record.
    pub created: bool,
    /// The record now on file. For `created == false` this is the original
    /// record, with the first submitter and timestamp.
    pub record: AnchorRecord,
    /// Sequence of the event announcing the record. `None` only when the
    /// record already existed and its event could not be looked up.
    pub sequence: Option<u64>,
}

/// What [`AnchorService::reconcile`] repaired.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Records re-inserted into the store from the event log.
    pub records_restored: u64,
    /// Events appended for records the log did not announce.
    pub events_appended: u64,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.records_restored == 0 && self.events_appended == 0
    }
}

/// Result of [`AnchorService::verify_audit_trail`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub events: u64,
    pub records: usize,
    /// Why the log itself failed verification (gap, repeated hash, broken chain).
    pub log_error: Option<String>,
    /// Hashes in the store that no event announces.
    pub unannounced: Vec<AnchorHash>,
    /// Hashes announced by an event but absent from the store.
    pub missing: Vec<AnchorHash>,
    /// Hashes whose stored record differs from the announced one.
    pub mismatched: Vec<AnchorHash>,
}

impl AuditReport {
    /// Whether replaying the log reproduces the live store exactly.
    pub fn is_consistent(&self) -> bool {
        self.log_error.is_none()
            && self.unannounced.is_empty()
            && self.missing.is_empty()
            && self.mismatched.is_empty()
    }
}

/// The anchor registry.
///
/// Anchors are idempotent: the first call for a hash creates its record and
/// emits exactly one event, and every later call reports that same record.
/// All methods take `&self` and may be called from many threads at once.
pub struct AnchorService {
    store: Arc<dyn AnchorStore>,
    log: Arc<dyn EventLog>,
    clock: Arc<dyn Clock>,
}

impl AnchorService {
    pub fn new(store: Arc<dyn AnchorStore>, log: Arc<dyn EventLog>, clock: Arc<dyn Clock>) -> Self {
        Self { store, log, clock }
    }

    /// Build the store, log, and clock described by `config`.
    ///
    /// A durable registry is reconciled on open, so a crash between a record
    /// insert and its event append is repaired before the first call.
    pub fn open(config: &RegistryConfig) -> ServiceResult<Self> {
        config.validate()?;
        let clock = Arc::new(HybridLogicalClock::new(config.node_id));

        let (store, log): (Arc<dyn AnchorStore>, Arc<dyn EventLog>) =
            match (config.records_path(), config.events_path()) {
                (Some(records), Some(events)) => (
                    Arc::new(FileAnchorStore::open(
                        &records,
                        config.shards,
                        config.wal_config(),
                    )?),
                    Arc::new(AnchorEventLog::open(&events, config.log_config())?),
                ),
                _ => (
                    Arc::new(InMemoryAnchorStore::with_shards(config.shards)),
                    Arc::new(AnchorEventLog::in_memory(config.log_config())),
                ),
            };

        let service = Self::new(store, log, clock);
        if config.data_dir.is_some() {
            let report = service.reconcile()?;
            info!(
                data_dir = ?config.data_dir,
                records = service.store.len()?,
                next_sequence = service.log.next_sequence()?,
                repaired = !report.is_clean(),
                "anchor registry opened"
            );
        }
        Ok(service)
    }

    /// An in-memory registry with default settings.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryAnchorStore::new()),
            Arc::new(AnchorEventLog::in_memory(Default::default())),
            Arc::new(HybridLogicalClock::new(0)),
        )
    }

    /// Declare that `hash` exists, on behalf of `submitter`.
    ///
    /// Succeeds whether or not the hash was already anchored. Input is
    /// validated before any storage access.
    pub fn anchor(&self, hash: &[u8], submitter: &str) -> ServiceResult<AnchorResult> {
        let hash = AnchorHash::from_slice(hash)?;
        let submitter = SubmitterId::new(submitter)?;
        self.anchor_hash(hash, submitter)
    }

    /// [`anchor`](Self::anchor) for already-validated inputs.
    ///
    /// The event is appended while the store still holds the hash's commit
    /// lock, so a record is never visible before its event and event order
    /// follows the order in which inserts complete.
    pub fn anchor_hash(&self, hash: AnchorHash, submitter: SubmitterId) -> ServiceResult<AnchorResult> {
        let candidate = AnchorRecord::new(hash, submitter, self.clock.now());

        let mut appended = None;
        let outcome = self.store.try_insert_with(&candidate, &mut |record| {
            appended = Some(self.log.append(record)?.into_event());
            Ok(())
        })?;

        match outcome {
            InsertOutcome::Inserted => {}
            InsertOutcome::HookFailed(e) => {
                warn!(hash = %hash, error = %e, "record committed but event append failed");
                return Err(ServiceError::inconsistent(
                    hash,
                    format!("event append failed: {e}"),
                ));
            }
            InsertOutcome::Exists => return self.existing(hash),
        }

        let event = appended
            .ok_or_else(|| ServiceError::inconsistent(hash, "record committed without an event"))?;
        let event = Self::check_announces(&candidate, event)?;
        info!(
            hash = %hash,
            submitter = %candidate.anchored_by,
            sequence = event.sequence,
            "hash anchored"
        );
        Ok(AnchorResult {
            created: true,
            record: candidate,
            sequence: Some(event.sequence),
        })
    }

    fn existing(&self, hash: AnchorHash) -> ServiceResult<AnchorResult> {
        let existing = self.store.get(&hash)?.ok_or_else(|| {
            ServiceError::inconsistent(hash, "insert was refused but no record is stored")
        })?;
        let sequence = self.heal_event(&existing);
        debug!(hash = %hash, ?sequence, "hash already anchored");
        Ok(AnchorResult {
            created: false,
            record: existing,
            sequence,
        })
    }

    /// Whether a record exists for `hash`. Pure read.
    pub fn is_anchored(&self, hash: &[u8]) -> ServiceResult<bool> {
        let hash = AnchorHash::from_slice(hash)?;
        Ok(self.store.contains(&hash)?)
    }

    /// The record for `hash`, if anchored. Pure read.
    pub fn record(&self, hash: &[u8]) -> ServiceResult<Option<AnchorRecord>> {
        let hash = AnchorHash::from_slice(hash)?;
        Ok(self.store.get(&hash)?)
    }

    /// Anchor the SHA-256 fingerprint of `document`'s canonical JSON form.
    pub fn anchor_document<T: Serialize>(
        &self,
        document: &T,
        submitter: &str,
    ) -> ServiceResult<AnchorResult> {
        let submitter = SubmitterId::new(submitter)?;
        let hash = fingerprint_json(document)?;
        self.anchor_hash(hash, submitter)
    }

    /// The record anchoring `document`, if its fingerprint was anchored.
    pub fn verify_document<T: Serialize>(&self, document: &T) -> ServiceResult<Option<AnchorRecord>> {
        let hash = fingerprint_json(document)?;
        Ok(self.store.get(&hash)?)
    }

    /// Events from `sequence` onward, then live events as they are appended.
    pub fn subscribe_from(&self, sequence: u64) -> ServiceResult<EventSubscription> {
        Ok(self.log.subscribe_from(sequence)?)
    }

    /// Events with `sequence >= from`, in order.
    pub fn events_from(&self, from: u64) -> ServiceResult<Vec<AnchorEvent>> {
        Ok(self.log.read_from(from)?)
    }

    /// The sequence the next new anchor will receive.
    pub fn next_sequence(&self) -> ServiceResult<u64> {
        Ok(self.log.next_sequence()?)
    }

    /// Bring the store and the log back into agreement.
    ///
    /// Records the log announces but the store lost are re-inserted. Records
    /// the log never announced get their event now, in `anchored_at` order.
    pub fn reconcile(&self) -> ServiceResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let events = self.log.read_from(0)?;
        report.records_restored = ReplayEngine::replay(&events, self.store.as_ref())?.applied;

        for record in self.store.records()? {
            if self.log.event_for(&record.hash)?.is_some() {
                continue;
            }
            let event = self.announce(&record)?;
            warn!(hash = %record.hash, sequence = event.sequence, "appended missing anchor event");
            report.events_appended += 1;
        }

        if !report.is_clean() {
            info!(
                records_restored = report.records_restored,
                events_appended = report.events_appended,
                "registry reconciled"
            );
        }
        Ok(report)
    }

    /// Replay the whole log into a fresh store and compare it with the live one.
    pub fn verify_audit_trail(&self) -> ServiceResult<AuditReport> {
        let events = self.log.read_from(0)?;
        let live = self.store.records()?;
        let mut report = AuditReport {
            events: events.len() as u64,
            records: live.len(),
            ..AuditReport::default()
        };

        if let Err(e) = ReplayEngine::verify(&events) {
            warn!(error = %e, "audit log failed verification");
            report.log_error = Some(e.to_string());
        }

        let mut announced: HashMap<AnchorHash, AnchorRecord> =
            events.iter().map(|e| (e.hash, e.record())).collect();
        for record in live {
            match announced.remove(&record.hash) {
                None => report.unannounced.push(record.hash),
                Some(replayed) if replayed != record => report.mismatched.push(record.hash),
                Some(_) => {}
            }
        }
        report.missing = announced.into_keys().collect();
        report.missing.sort();

        debug!(consistent = report.is_consistent(), "audit trail verified");
        Ok(report)
    }

    pub fn store(&self) -> &Arc<dyn AnchorStore> {
        &self.store
    }

    /// Append the event for a committed record.
    ///
    /// The log may already hold an event for the hash when a concurrent
    /// caller healed it first; that is fine as long as it announces this
    /// same record.
    fn announce(&self, record: &AnchorRecord) -> ServiceResult<AnchorEvent> {
        let appended = self.log.append(record).map_err(|e| {
            warn!(hash = %record.hash, error = %e, "record committed but event append failed");
            ServiceError::inconsistent(record.hash, format!("event append failed: {e}"))
        })?;
        Self::check_announces(record, appended.into_event())
    }

    fn check_announces(record: &AnchorRecord, event: AnchorEvent) -> ServiceResult<AnchorEvent> {
        if event.record() != *record {
            return Err(ServiceError::inconsistent(
                record.hash,
                format!("log announces a different record at sequence {}", event.sequence),
            ));
        }
        Ok(event)
    }

    /// Sequence of the event for an existing record, appending the event if
    /// an earlier call committed the record but never logged it.
    fn heal_event(&self, record: &AnchorRecord) -> Option<u64> {
        match self.log.event_for(&record.hash) {
            Ok(Some(event)) => Some(event.sequence),
            Ok(None) => match self.announce(record) {
                Ok(event) => {
                    warn!(hash = %record.hash, sequence = event.sequence, "healed missing anchor event");
                    Some(event.sequence)
                }
                Err(e) => {
                    warn!(error = %e, "could not heal missing anchor event");
                    None
                }
            },
            Err(e) => {
                warn!(hash = %record.hash, error = %e, "event lookup failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for AnchorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorService")
            .field("records", &self.store.len().unwrap_or_default())
            .field("next_sequence", &self.log.next_sequence().unwrap_or_default())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorKind;
    use anchor_log::{Appended, LogConfig, LogError, LogResult};
    use anchor_types::TemporalAnchor;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    /// Event log whose appends can be switched off, to simulate a crash
    /// between the record insert and the event append.
    struct FlakyLog {
        inner: AnchorEventLog,
        failing: AtomicBool,
    }

    impl FlakyLog {
        fn new() -> Self {
            Self {
                inner: AnchorEventLog::in_memory(LogConfig::default()),
                failing: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl EventLog for FlakyLog {
        fn append(&self, record: &AnchorRecord) -> LogResult<Appended> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(LogError::Unavailable("simulated outage".into()));
            }
            self.inner.append(record)
        }

        fn event_for(&self, hash: &AnchorHash) -> LogResult<Option<AnchorEvent>> {
            self.inner.event_for(hash)
        }

        fn read_from(&self, from: u64) -> LogResult<Vec<AnchorEvent>> {
            self.inner.read_from(from)
        }

        fn next_sequence(&self) -> LogResult<u64> {
            self.inner.next_sequence()
        }

        fn subscribe_from(&self, from: u64) -> LogResult<EventSubscription> {
            self.inner.subscribe_from(from)
        }
    }

    /// Event log that parks the append for one hash between two meetings at
    /// `gate`.
    struct PausingLog {
        inner: AnchorEventLog,
        paused: AnchorHash,
        gate: Arc<Barrier>,
    }

    impl EventLog for PausingLog {
        fn append(&self, record: &AnchorRecord) -> LogResult<Appended> {
            if record.hash == self.paused {
                self.gate.wait();
                self.gate.wait();
            }
            self.inner.append(record)
        }

        fn event_for(&self, hash: &AnchorHash) -> LogResult<Option<AnchorEvent>> {
            self.inner.event_for(hash)
        }

        fn read_from(&self, from: u64) -> LogResult<Vec<AnchorEvent>> {
            self.inner.read_from(from)
        }

        fn next_sequence(&self) -> LogResult<u64> {
            self.inner.next_sequence()
        }

        fn subscribe_from(&self, from: u64) -> LogResult<EventSubscription> {
            self.inner.subscribe_from(from)
        }
    }

    fn manual_service(start_ms: u64) -> (AnchorService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        let service = AnchorService::new(
            Arc::new(InMemoryAnchorStore::new()),
            Arc::new(AnchorEventLog::in_memory(LogConfig::default())),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (service, clock)
    }

    fn flaky_service() -> (AnchorService, Arc<FlakyLog>) {
        let log = Arc::new(FlakyLog::new());
        let service = AnchorService::new(
            Arc::new(InMemoryAnchorStore::new()),
            Arc::clone(&log) as Arc<dyn EventLog>,
            Arc::new(ManualClock::new(50)),
        );
        (service, log)
    }

    #[test]
    fn first_submitter_wins_and_later_callers_see_it() {
        let (service, clock) = manual_service(1_000);
        let h = [0x11; 32];
        assert!(!service.is_anchored(&h).unwrap());

        let alice = service.anchor(&h, "alice").unwrap();
        assert!(alice.created);
        assert_eq!(alice.sequence, Some(0));
        assert_eq!(alice.record.anchored_by.as_str(), "alice");
        assert_eq!(alice.record.anchored_at, TemporalAnchor::new(1_000, 0, 0));

        clock.advance(500);
        let bob = service.anchor(&h, "bob").unwrap();
        assert!(!bob.created);
        assert_eq!(bob.record, alice.record);
        assert_eq!(bob.sequence, Some(0));

        assert!(service.is_anchored(&h).unwrap());
        let events = service.events_from(0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].submitter.as_str(), "alice");
    }

    #[test]
    fn record_becomes_visible_only_with_its_event() {
        let a = [0xa1; 32];
        let gate = Arc::new(Barrier::new(2));
        let service = Arc::new(AnchorService::new(
            Arc::new(InMemoryAnchorStore::new()),
            Arc::new(PausingLog {
                inner: AnchorEventLog::in_memory(LogConfig::default()),
                paused: AnchorHash::from_array(a),
                gate: Arc::clone(&gate),
            }),
            Arc::new(ManualClock::new(10)),
        ));

        let writer = {
            let service = Arc::clone(&service);
            thread::spawn(move || service.anchor(&a, "alice").unwrap())
        };
        // The writer is now inside the commit of `a`, before its event exists.
        gate.wait();

        let (seen_tx, seen_rx) = mpsc::channel();
        let reader = {
            let service = Arc::clone(&service);
            thread::spawn(move || {
                let visible = service.is_anchored(&a).unwrap();
                let logged = service
                    .events_from(0)
                    .unwrap()
                    .iter()
                    .any(|event| event.hash.as_bytes() == &a);
                seen_tx.send((visible, logged)).unwrap();
            })
        };
        assert!(seen_rx.recv_timeout(Duration::from_millis(50)).is_err());

        // Hashes in other shards commit meanwhile.
        let b = service.anchor(&[0xb2; 32], "bob").unwrap();
        assert!(b.created);
        assert_eq!(b.sequence, Some(0));

        gate.wait();
        let a_result = writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(seen_rx.recv().unwrap(), (true, true));
        assert_eq!(a_result.sequence, Some(1));

        let c = service.anchor(&[0xc3; 32], "carol").unwrap();
        assert!(c.sequence > a_result.sequence);
        assert!(service.verify_audit_trail().unwrap().is_consistent());
    }

    #[test]
    fn unknown_hash_is_absent_and_reading_emits_nothing() {
        let (service, _) = manual_service(0);
        let h = [0x22; 32];
        assert!(!service.is_anchored(&h).unwrap());
        assert!(service.record(&h).unwrap().is_none());
        assert_eq!(service.next_sequence().unwrap(), 0);
    }

    #[test]
    fn malformed_input_is_rejected_before_storage() {
        let (service, _) = manual_service(0);

        let short = service.anchor(&[0u8; 31], "alice").unwrap_err();
        assert_eq!(short.kind(), ErrorKind::InvalidInput);
        for blank in ["", "   "] {
            let err = service.anchor(&[1u8; 32], blank).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidInput);
        }
        assert_eq!(
            service.is_anchored(&[0u8; 33]).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );

        assert!(service.store().is_empty().unwrap());
        assert_eq!(service.next_sequence().unwrap(), 0);
    }

    #[test]
    fn sequences_follow_call_order() {
        let (service, clock) = manual_service(10);
        let mut last = None;
        for seed in 0u8..20 {
            clock.advance(1);
            let seq = service.anchor(&[seed; 32], "s").unwrap().sequence.unwrap();
            if let Some(prev) = last {
                assert!(seq > prev);
            }
            last = Some(seq);
        }
        assert_eq!(last, Some(19));
    }

    #[test]
    fn concurrent_anchors_of_one_hash_create_exactly_once() {
        let service = Arc::new(AnchorService::in_memory());
        let h = [0x33; 32];

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let service = Arc::clone(&service);
                thread::spawn(move || service.anchor(&h, &format!("submitter-{i}")).unwrap())
            })
            .collect();
        let results: Vec<AnchorResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.created).count(), 1);
        let winner = &results.iter().find(|r| r.created).unwrap().record;
        assert!(results.iter().all(|r| &r.record == winner));
        assert!(results.iter().all(|r| r.sequence == Some(0)));
        assert_eq!(service.events_from(0).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_distinct_anchors_replay_to_the_store() {
        let service = Arc::new(AnchorService::in_memory());
        let handles: Vec<_> = (0u8..8)
            .map(|t| {
                let service = Arc::clone(&service);
                thread::spawn(move || {
                    for i in 0u8..32 {
                        let mut h = [t; 32];
                        h[31] = i;
                        assert!(service.anchor(&h, "s").unwrap().created);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let events = service.events_from(0).unwrap();
        assert_eq!(events.len(), 256);
        assert!(events.iter().enumerate().all(|(i, e)| e.sequence == i as u64));

        let rebuilt = ReplayEngine::rebuild(&events).unwrap();
        assert_eq!(rebuilt.records().unwrap(), service.store().records().unwrap());
        assert!(service.verify_audit_trail().unwrap().is_consistent());
    }

    #[test]
    fn failed_event_append_is_reported_and_healed_by_retry() {
        let (service, log) = flaky_service();
        let h = [0x44; 32];

        log.set_failing(true);
        let err = service.anchor(&h, "alice").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inconsistent);
        assert!(err.is_retryable());
        assert!(service.is_anchored(&h).unwrap());

        let audit = service.verify_audit_trail().unwrap();
        assert_eq!(audit.unannounced, vec![AnchorHash::from_array(h)]);
        assert!(!audit.is_consistent());

        log.set_failing(false);
        let retry = service.anchor(&h, "bob").unwrap();
        assert!(!retry.created);
        assert_eq!(retry.record.anchored_by.as_str(), "alice");
        assert_eq!(retry.sequence, Some(0));

        // Healed once; later calls find the event instead of adding one.
        service.anchor(&h, "carol").unwrap();
        assert_eq!(service.events_from(0).unwrap().len(), 1);
        assert!(service.verify_audit_trail().unwrap().is_consistent());
    }

    #[test]
    fn duplicate_during_outage_still_succeeds() {
        let (service, log) = flaky_service();
        let h = [0x55; 32];
        service.anchor(&h, "alice").unwrap();

        log.set_failing(true);
        let again = service.anchor(&h, "bob").unwrap();
        assert!(!again.created);
        assert_eq!(again.sequence, Some(0));
    }

    #[test]
    fn reconcile_appends_missing_events_in_time_order() {
        let (service, log) = flaky_service();
        service.anchor(&[1; 32], "a").unwrap();

        log.set_failing(true);
        assert!(service.anchor(&[2; 32], "b").is_err());
        assert!(service.anchor(&[3; 32], "c").is_err());
        log.set_failing(false);

        let report = service.reconcile().unwrap();
        assert_eq!(report.events_appended, 2);
        assert_eq!(report.records_restored, 0);

        let events = service.events_from(0).unwrap();
        assert_eq!(events.len(), 3);
        assert!(ReplayEngine::verify(&events).is_ok());
        assert!(service.verify_audit_trail().unwrap().is_consistent());
        assert!(service.reconcile().unwrap().is_clean());
    }

    #[test]
    fn documents_anchor_by_canonical_fingerprint() {
        let (service, _) = manual_service(0);
        let credential = json!({"subject": "did:key:z6Mk", "claims": {"b": 2, "a": 1}});
        let reordered = json!({"claims": {"a": 1, "b": 2}, "subject": "did:key:z6Mk"});

        let anchored = service.anchor_document(&credential, "issuer").unwrap();
        assert!(anchored.created);

        let found = service.verify_document(&reordered).unwrap().unwrap();
        assert_eq!(found, anchored.record);
        assert!(service
            .verify_document(&json!({"subject": "someone else"}))
            .unwrap()
            .is_none());
        assert!(!service.anchor_document(&reordered, "other").unwrap().created);
    }

    #[test]
    fn subscription_starts_at_requested_sequence() {
        let (service, _) = manual_service(0);
        service.anchor(&[1; 32], "a").unwrap();
        service.anchor(&[2; 32], "b").unwrap();

        let mut sub = service.subscribe_from(1).unwrap();
        service.anchor(&[3; 32], "c").unwrap();
        service.anchor(&[3; 32], "d").unwrap();

        let mut seen = Vec::new();
        while let Some(event) = sub.try_recv().unwrap() {
            seen.push((event.sequence, event.submitter.as_str().to_string()));
        }
        assert_eq!(seen, vec![(1, "b".to_string()), (2, "c".to_string())]);
    }

    #[test]
    fn durable_registry_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig::durable(dir.path());

        let service = AnchorService::open(&config).unwrap();
        let first = service.anchor(&[7; 32], "alice").unwrap();
        service.anchor(&[8; 32], "bob").unwrap();
        drop(service);

        let service = AnchorService::open(&config).unwrap();
        assert!(service.is_anchored(&[7; 32]).unwrap());
        assert_eq!(service.next_sequence().unwrap(), 2);

        let again = service.anchor(&[7; 32], "mallory").unwrap();
        assert!(!again.created);
        assert_eq!(again.record, first.record);

        let next = service.anchor(&[9; 32], "carol").unwrap();
        assert_eq!(next.sequence, Some(2));
        assert!(service.verify_audit_trail().unwrap().is_consistent());
    }

    #[test]
    fn open_repairs_record_without_event() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig::durable(dir.path());
        drop(AnchorService::open(&config).unwrap());

        // A record that reached disk while its event did not.
        let orphan = AnchorRecord::new(
            AnchorHash::from_array([6; 32]),
            SubmitterId::new("alice").unwrap(),
            TemporalAnchor::new(5, 0, 0),
        );
        {
            let records = config.records_path().unwrap();
            let store = FileAnchorStore::open(&records, config.shards, config.wal_config()).unwrap();
            assert!(store.try_insert(&orphan).unwrap());
        }

        let service = AnchorService::open(&config).unwrap();
        let events = service.events_from(0).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].record(), orphan);
    }

    #[test]
    fn open_rejects_invalid_config() {
        let config = RegistryConfig {
            shards: 0,
            ..RegistryConfig::in_memory()
        };
        let err = AnchorService::open(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    proptest! {
        #[test]
        fn anchoring_is_idempotent(
            hash in proptest::array::uniform32(any::<u8>()),
            submitters in proptest::collection::vec("[a-z]{1,8}", 1..6),
        ) {
            let (service, clock) = manual_service(0);
            let mut results = Vec::new();
            for submitter in &submitters {
                clock.advance(1);
                results.push(service.anchor(&hash, submitter).unwrap());
            }

            prop_assert!(results[0].created);
            prop_assert!(results[1..].iter().all(|r| !r.created));
            prop_assert!(results.iter().all(|r| r.record == results[0].record));
            prop_assert_eq!(results[0].record.anchored_by.as_str(), submitters[0].as_str());
            prop_assert_eq!(service.events_from(0).unwrap().len(), 1);
        }

        #[test]
        fn replaying_events_reproduces_the_store(seeds in proptest::collection::vec(any::<u8>(), 0..40)) {
            let (service, clock) = manual_service(0);
            for seed in &seeds {
                clock.advance(u64::from(*seed % 3));
                service.anchor(&[*seed; 32], "s").unwrap();
            }
            let rebuilt = ReplayEngine::rebuild(&service.events_from(0).unwrap()).unwrap();
            prop_assert_eq!(rebuilt.records().unwrap(), service.store().records().unwrap());
        }
    }
}
