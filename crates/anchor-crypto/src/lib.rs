//! Cryptographic primitives for the anchor registry.
//!
//! Provides domain-separated BLAKE3 hashing, hash-chain verification for the
//! anchor audit trail, and SHA-256 fingerprints of canonical JSON documents.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod chain;
pub mod fingerprint;
pub mod hasher;

pub use chain::{ChainError, ChainLinked, HashChainVerifier};
pub use fingerprint::{canonical_json, fingerprint_bytes, fingerprint_json, FingerprintError};
pub use hasher::ContentHasher;
