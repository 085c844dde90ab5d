//! Ordered, tamper-evident event log for the anchor registry.
//!
//! Every newly created anchor record produces exactly one [`AnchorEvent`].
//! Events carry a gap-free sequence number and are hash-chained, so the log
//! is both the audit trail and the source from which the record set can be
//! rebuilt.
//!
//! - [`AnchorEventLog`] -- sequencing, optional write-ahead persistence, and
//!   fan-out to subscribers
//! - [`EventSubscription`] -- replay from any past sequence, then live events,
//!   with no gaps and no duplicates
//! - [`ReplayEngine`] -- verification and deterministic replay into a store

pub mod error;
pub mod event;
pub mod log;
pub mod replay;
pub mod subscription;

pub use error::{LogError, LogResult};
pub use event::AnchorEvent;
pub use log::{Appended, AnchorEventLog, EventLog, LogConfig};
pub use replay::{ReplayEngine, ReplayResult};
pub use subscription::EventSubscription;
