//! # BTPS Trust Store
//!
//! Durable records of which sender an inbox has authorized. A
//! [`TrustRecord`] is created when a `TRUST_REQ` is accepted, mutated
//! only by the receiving domain, and deleted by explicit revocation.
//!
//! The [`TrustStore`] trait is the abstract contract; [`FileTrustStore`]
//! is the file-backed implementation safe for concurrent use by multiple
//! processes sharing one JSON file:
//!
//! - writes go through an advisory file lock, a temp file, and an atomic
//!   rename, so they never interleave;
//! - every read checks the file's mtime and reloads when another process
//!   has flushed;
//! - mutations are coalesced by a debounced (1 s) background flush.

pub mod error;
pub mod file_store;
pub mod record;
pub mod store;

pub use error::*;
pub use file_store::*;
pub use record::*;
pub use store::*;
