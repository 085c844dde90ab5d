use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anchor_store::{WalConfig, WriteAheadLog};
use anchor_types::{AnchorHash, AnchorRecord};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::{LogError, LogResult};
use crate::event::AnchorEvent;
use crate::replay::ReplayEngine;
use crate::subscription::EventSubscription;

/// Outcome of [`EventLog::append`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Appended {
    /// This call created the event.
    New(AnchorEvent),
    /// The hash had already been logged; the original event is returned.
    Existing(AnchorEvent),
}

impl Appended {
    pub fn event(&self) -> &AnchorEvent {
        match self {
            Self::New(event) | Self::Existing(event) => event,
        }
    }

    pub fn into_event(self) -> AnchorEvent {
        match self {
            Self::New(event) | Self::Existing(event) => event,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::New(_))
    }
}

/// Ordered audit log of anchor events.
///
/// Implementations allocate sequence numbers, persist events, and deliver
/// them to subscribers. Appends are idempotent per hash: a hash is logged at
/// most once no matter how often it is submitted.
pub trait EventLog: Send + Sync {
    /// Append the event announcing `record`, unless its hash is already logged.
    fn append(&self, record: &AnchorRecord) -> LogResult<Appended>;

    /// The event that announced `hash`, if any.
    fn event_for(&self, hash: &AnchorHash) -> LogResult<Option<AnchorEvent>>;

    /// All events with `sequence >= from`, in order.
    fn read_from(&self, from: u64) -> LogResult<Vec<AnchorEvent>>;

    /// The sequence the next appended event will receive.
    fn next_sequence(&self) -> LogResult<u64>;

    /// Subscribe to events starting at `from`: first the backlog, then live.
    fn subscribe_from(&self, from: u64) -> LogResult<EventSubscription>;
}

/// Configuration for an [`AnchorEventLog`].
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Capacity of the live broadcast channel shared by subscribers.
    pub channel_capacity: usize,
    /// Write-ahead persistence settings (durable logs only).
    pub wal: WalConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            wal: WalConfig::default(),
        }
    }
}

#[derive(Default)]
pub(crate) struct LogState {
    pub(crate) events: Vec<AnchorEvent>,
    by_hash: HashMap<AnchorHash, u64>,
}

impl LogState {
    fn head_hash(&self) -> Option<[u8; 32]> {
        self.events.last().map(|e| e.event_hash)
    }

    pub(crate) fn read_from(&self, from: u64) -> Vec<AnchorEvent> {
        let start = usize::try_from(from).unwrap_or(usize::MAX).min(self.events.len());
        self.events[start..].to_vec()
    }
}

/// State shared between the log and its subscriptions.
pub(crate) struct LogShared {
    state: Mutex<LogState>,
    sender: broadcast::Sender<AnchorEvent>,
}

impl LogShared {
    pub(crate) fn lock(&self) -> LogResult<MutexGuard<'_, LogState>> {
        self.state
            .lock()
            .map_err(|_| LogError::Unavailable("event log lock poisoned".into()))
    }

    pub(crate) fn receiver(&self) -> broadcast::Receiver<AnchorEvent> {
        self.sender.subscribe()
    }
}

/// The registry's event log.
///
/// Sequence allocation, write-ahead persistence, and broadcast all happen
/// under one mutex, so the durable order, the in-memory order, and the
/// delivery order are the same total order.
pub struct AnchorEventLog {
    shared: Arc<LogShared>,
    wal: Option<WriteAheadLog<AnchorEvent>>,
}

impl AnchorEventLog {
    /// A log held only in memory.
    pub fn in_memory(config: LogConfig) -> Self {
        Self::from_events(Vec::new(), None, &config)
    }

    /// Open (or create) a durable log at `path`, recovering its events.
    ///
    /// The recovered events must form a contiguous, verifiable chain;
    /// otherwise the log refuses to open.
    pub fn open(path: &Path, config: LogConfig) -> LogResult<Self> {
        let wal = WriteAheadLog::open(path, config.wal.clone())?;
        let events = wal.recover()?;
        ReplayEngine::verify(&events)?;
        info!(path = %path.display(), events = events.len(), "event log opened");
        Ok(Self::from_events(events, Some(wal), &config))
    }

    fn from_events(
        events: Vec<AnchorEvent>,
        wal: Option<WriteAheadLog<AnchorEvent>>,
        config: &LogConfig,
    ) -> Self {
        let by_hash = events.iter().map(|e| (e.hash, e.sequence)).collect();
        let (sender, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            shared: Arc::new(LogShared {
                state: Mutex::new(LogState { events, by_hash }),
                sender,
            }),
            wal,
        }
    }

    /// Number of events in the log.
    pub fn len(&self) -> LogResult<usize> {
        Ok(self.shared.lock()?.events.len())
    }

    pub fn is_empty(&self) -> LogResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Whether the log persists to disk.
    pub fn is_durable(&self) -> bool {
        self.wal.is_some()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.sender.receiver_count()
    }
}

impl EventLog for AnchorEventLog {
    fn append(&self, record: &AnchorRecord) -> LogResult<Appended> {
        let mut state = self.shared.lock()?;

        if let Some(&seq) = state.by_hash.get(&record.hash) {
            return Ok(Appended::Existing(state.events[seq as usize].clone()));
        }

        let sequence = state.events.len() as u64;
        let event = AnchorEvent::new(sequence, record, state.head_hash());

        // Durable first; a failed write leaves the sequence unallocated.
        if let Some(wal) = &self.wal {
            wal.append(&event)?;
        }

        state.by_hash.insert(event.hash, sequence);
        state.events.push(event.clone());
        // Sending under the lock keeps delivery in sequence order. An error
        // only means nobody is listening right now.
        let _ = self.shared.sender.send(event.clone());

        debug!(sequence, hash = %event.hash, "anchor event appended");
        Ok(Appended::New(event))
    }

    fn event_for(&self, hash: &AnchorHash) -> LogResult<Option<AnchorEvent>> {
        let state = self.shared.lock()?;
        Ok(state
            .by_hash
            .get(hash)
            .map(|&seq| state.events[seq as usize].clone()))
    }

    fn read_from(&self, from: u64) -> LogResult<Vec<AnchorEvent>> {
        Ok(self.shared.lock()?.read_from(from))
    }

    fn next_sequence(&self) -> LogResult<u64> {
        Ok(self.shared.lock()?.events.len() as u64)
    }

    fn subscribe_from(&self, from: u64) -> LogResult<EventSubscription> {
        // Backlog snapshot and receiver are taken under the same lock, so no
        // event can fall between them.
        let state = self.shared.lock()?;
        let receiver = self.shared.receiver();
        let backlog = state.read_from(from);
        drop(state);
        Ok(EventSubscription::new(
            Arc::clone(&self.shared),
            receiver,
            backlog,
            from,
        ))
    }
}

impl std::fmt::Debug for AnchorEventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorEventLog")
            .field("durable", &self.is_durable())
            .field("event_count", &self.len().unwrap_or_default())
            .finish()
    }
}
