use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::debug;

use crate::error::{LogError, LogResult};
use crate::event::AnchorEvent;
use crate::log::LogShared;

/// A gap-free, duplicate-free feed of anchor events.
///
/// Starts with the backlog from the requested sequence and continues with
/// live events. The subscription tracks the next sequence it owes the
/// caller: anything older is dropped, and if the live channel lagged the
/// missing range is re-read from the log.
pub struct EventSubscription {
    shared: Arc<LogShared>,
    receiver: broadcast::Receiver<AnchorEvent>,
    backlog: VecDeque<AnchorEvent>,
    next: u64,
}

impl EventSubscription {
    pub(crate) fn new(
        shared: Arc<LogShared>,
        receiver: broadcast::Receiver<AnchorEvent>,
        backlog: Vec<AnchorEvent>,
        from: u64,
    ) -> Self {
        Self {
            shared,
            receiver,
            backlog: backlog.into(),
            next: from,
        }
    }

    /// The sequence of the next event this subscription will yield.
    pub fn next_sequence(&self) -> u64 {
        self.next
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> LogResult<AnchorEvent> {
        loop {
            if let Some(event) = self.pop_backlog() {
                return Ok(event);
            }
            match self.receiver.recv().await {
                Ok(event) => {
                    if let Some(event) = self.accept(event)? {
                        return Ok(event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => self.refill(skipped)?,
                Err(RecvError::Closed) => return Err(LogError::SubscriptionClosed),
            }
        }
    }

    /// The next event if one is available now.
    pub fn try_recv(&mut self) -> LogResult<Option<AnchorEvent>> {
        loop {
            if let Some(event) = self.pop_backlog() {
                return Ok(Some(event));
            }
            match self.receiver.try_recv() {
                Ok(event) => {
                    if let Some(event) = self.accept(event)? {
                        return Ok(Some(event));
                    }
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Lagged(skipped)) => self.refill(skipped)?,
                Err(TryRecvError::Closed) => return Err(LogError::SubscriptionClosed),
            }
        }
    }

    fn pop_backlog(&mut self) -> Option<AnchorEvent> {
        while let Some(event) = self.backlog.pop_front() {
            if event.sequence == self.next {
                self.next += 1;
                return Some(event);
            }
        }
        None
    }

    /// Deliver a live event if it is the one owed; re-read the log if the
    /// channel skipped ahead.
    fn accept(&mut self, event: AnchorEvent) -> LogResult<Option<AnchorEvent>> {
        if event.sequence < self.next {
            return Ok(None);
        }
        if event.sequence == self.next {
            self.next += 1;
            return Ok(Some(event));
        }
        self.refill(event.sequence - self.next)?;
        Ok(self.pop_backlog())
    }

    fn refill(&mut self, missed: u64) -> LogResult<()> {
        debug!(from = self.next, missed, "subscription catching up from log");
        let events = self.shared.lock()?.read_from(self.next);
        self.backlog = events.into();
        Ok(())
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("next", &self.next)
            .field("backlog", &self.backlog.len())
            .finish()
    }
}
