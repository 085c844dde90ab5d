//! Public operation surface of the anchor registry.
//!
//! An anchor is a write-once declaration that a content hash exists,
//! attributed to the submitter that first declared it and stamped with a
//! logical timestamp. [`AnchorService`] composes the record store, the event
//! log, and a clock into two operations:
//!
//! - `anchor(hash, submitter)` -- idempotent; creates the record and emits
//!   exactly one event the first time, reports the original record after
//!   that
//! - `is_anchored(hash)` -- pure membership read
//!
//! plus reconciliation, audit-trail verification, document fingerprinting,
//! and event subscriptions.
//!
//! ```no_run
//! use anchor_service::{AnchorService, RegistryConfig};
//!
//! let service = AnchorService::open(&RegistryConfig::durable("/var/lib/anchors"))?;
//! let result = service.anchor(&[0xab; 32], "did:key:z6Mk")?;
//! println!("anchored by {} at {}", result.record.anchored_by, result.record.anchored_at);
//! assert!(service.is_anchored(&[0xab; 32])?);
//! # Ok::<(), anchor_service::ServiceError>(())
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod handle;
pub mod service;

pub use clock::{Clock, HybridLogicalClock, ManualClock};
pub use config::RegistryConfig;
pub use error::{ConfigError, ErrorKind, ServiceError, ServiceResult};
pub use handle::AnchorHandle;
pub use service::{AnchorResult, AnchorService, AuditReport, ReconcileReport};

pub use anchor_log::{AnchorEvent, EventSubscription};
pub use anchor_types::{AnchorHash, AnchorRecord, SubmitterId, TemporalAnchor};
