//! Connector events
//!
//! The connector reports everything that happens to it through a typed
//! broadcast stream. Events are dispatched after the internal state
//! transition completes, in order of occurrence, and never after the
//! client is destroyed.

use btps_core::{ArtifactEnvelope, ServerFrame, TypedDocument};

use crate::error::ErrorKind;
use crate::retry::RetryInfo;

/// A verified inbound message.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// A full artifact: signature verified, document decrypted (when
    /// applicable) and schema-validated.
    Artifact {
        envelope: Box<ArtifactEnvelope>,
        document: TypedDocument,
    },
    /// A server response frame correlated to a request by `reqId`.
    Response(ServerFrame),
}

/// Everything a connector can tell its caller.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// The TLS handshake completed; the connection is ready to send.
    Connected,
    /// An inbound line survived parse, verification, and validation.
    Message(InboundMessage),
    /// An outbound artifact reached the socket.
    MessageSent { artifact_id: String },
    /// Something went wrong; `retry` says whether the connector will
    /// re-run the connect pipeline on its own.
    Error {
        kind: ErrorKind,
        message: String,
        retry: RetryInfo,
    },
    /// The connection ended, remotely or via `end()`.
    End { retry: RetryInfo },
    /// The instance is fully torn down.
    Close,
}
