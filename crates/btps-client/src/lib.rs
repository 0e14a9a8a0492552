//! # BTPS Client
//!
//! The client connector for the BTPS bilateral trust protocol: a
//! TLS-dialing, DNS-resolving, retrying, backpressure-aware transport
//! that signs (and optionally encrypts) outgoing artifacts and reports
//! everything through a typed event stream.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use btps_client::{BtpsClient, BtpsClientOptions, CryptoOptions};
//! use btps_core::{ArtifactEnvelope, ArtifactType, Identity};
//!
//! let options = BtpsClientOptions::builder("billing$a.example", key_pem)
//!     .max_retries(3)
//!     .build()?;
//! let client = BtpsClient::new(options)?;
//!
//! let envelope = ArtifactEnvelope::new(
//!     ArtifactType::TrustRequest,
//!     Identity::parse("billing$a.example")?,
//!     Identity::parse("inbox$b.example")?,
//!     serde_json::json!({
//!         "name": "A Example Billing",
//!         "email": "billing@a.example",
//!         "reason": "Monthly invoicing",
//!     }),
//! );
//!
//! let response = client
//!     .deliver(envelope, &CryptoOptions::standard(), Duration::from_secs(30))
//!     .await?;
//! assert!(response.status.ok);
//! ```
//!
//! For long-lived connections, use [`BtpsClient::connect`] /
//! [`BtpsClient::send`] directly and consume [`BtpsClient::events`].

pub mod codec;
pub mod connector;
pub mod error;
pub mod events;
pub mod options;
pub mod queue;
pub mod retry;
mod session;
mod tls;

pub use codec::*;
pub use connector::*;
pub use error::*;
pub use events::*;
pub use options::*;
pub use queue::*;
pub use retry::*;
