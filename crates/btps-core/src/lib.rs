//! # BTPS Core
//!
//! Core types and validation for the BTPS bilateral trust protocol.
//!
//! BTPS exchanges individually signed, optionally encrypted JSON artifacts
//! between `account$domain` identities over TLS. This crate provides the
//! foundational pieces shared by every other crate in the workspace:
//!
//! ## Key Types
//!
//! - [`Identity`]: a parsed `account$domain` address
//! - [`ArtifactEnvelope`]: the outermost wire record carried on each line
//! - [`ArtifactType`]: the closed set of artifact discriminators
//! - [`TypedDocument`]: the decoded payload of an envelope, one variant
//!   per artifact kind
//! - [`ValidationError`]: a field-path-addressed schema violation
//! - [`BtpsError`]: top-level error aggregating the core error enums
//!
//! ## Validation Model
//!
//! Validation is total: [`validate_envelope`] and [`TypedDocument::decode`]
//! either produce a typed value or a [`ValidationError`] naming the
//! offending field. Envelopes are validated before signing on the way out
//! and immediately after decryption (or signature verification, when no
//! encryption is present) on the way in.

pub mod document;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod validation;

// Re-export main types
pub use document::*;
pub use envelope::*;
pub use error::*;
pub use identity::*;
pub use validation::*;

/// The protocol version carried in every envelope and DNS record.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Default BTPS port when the DNS record or peer URL names none.
pub const DEFAULT_PORT: u16 = 3443;
