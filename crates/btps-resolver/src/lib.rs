//! # BTPS Resolver
//!
//! DNS discovery for BTPS peers. A domain publishes two kinds of TXT
//! records under the reserved `_btps` namespace:
//!
//! - `_btps.<domain>`: `v=1.0.0; u=host[:port]; s=<selector>`, naming
//!   where the domain accepts BTPS traffic and which key selector is
//!   active.
//! - `<selector>._btps.<account>.<domain>`: `v=1.0.0; k=<type>; p=<base64>`,
//!   carrying the public key used to verify that account's signatures.
//!
//! The [`HostResolver`] trait is the seam between the connector and DNS:
//! production code uses [`DnsResolver`] (hickory), tests use
//! [`StaticResolver`] with a fixed record table.

pub mod address;
pub mod dns;
pub mod error;

pub use address::*;
pub use dns::*;
pub use error::*;
