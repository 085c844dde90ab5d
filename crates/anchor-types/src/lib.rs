//! Foundation types for the anchor registry.
//!
//! This crate provides the key, identity, and temporal types shared by every
//! other registry crate.
//!
//! # Key Types
//!
//! - [`AnchorHash`] -- Fixed-length content fingerprint, the registry's sole key
//! - [`SubmitterId`] -- Opaque identity of whoever declared a hash
//! - [`TemporalAnchor`] -- Hybrid Logical Clock timestamp stamped on each anchor
//! - [`AnchorRecord`] -- The write-once fact that a hash was anchored

pub mod error;
pub mod hash;
pub mod record;
pub mod submitter;
pub mod temporal;

pub use error::TypeError;
pub use hash::{AnchorHash, HASH_LEN};
pub use record::AnchorRecord;
pub use submitter::SubmitterId;
pub use temporal::TemporalAnchor;
