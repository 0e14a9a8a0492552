//! Session bootstrap
//!
//! The one-shot `connect → send → await response → end` flow most
//! callers want: deliver a single artifact and return the server's
//! response frame.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use btps_core::{ArtifactEnvelope, ServerFrame};

use crate::codec::CryptoOptions;
use crate::connector::BtpsClient;
use crate::error::{ClientError, ClientResult};
use crate::events::{ClientEvent, InboundMessage};

impl BtpsClient {
    /// Deliver one artifact to its recipient and wait for the matching
    /// server response frame.
    ///
    /// Connects (with the configured retry behavior), sends, awaits a
    /// `btps_response`/`btps_error` whose `reqId` matches the artifact
    /// id, then ends the connection gracefully. The artifact id stays
    /// stable across connect retries, so a deduplicating server sees
    /// one delivery.
    pub async fn deliver(
        &self,
        envelope: ArtifactEnvelope,
        crypto: &CryptoOptions,
        timeout: Duration,
    ) -> ClientResult<ServerFrame> {
        // Subscribe before connecting so no event is missed.
        let mut events = self.events();
        let recipient = envelope.to.to_string();
        self.connect(&recipient).await;

        let result = tokio::time::timeout(timeout, async {
            wait_for_connected(&mut events).await?;
            let artifact_id = self.send_with(envelope, crypto).await?;
            debug!(artifact_id = %artifact_id, "Awaiting server response");
            wait_for_response(&mut events, &artifact_id).await
        })
        .await
        .map_err(|_| ClientError::ConnectionTimeout(timeout.as_millis() as u64))?;

        self.end().await;
        result
    }
}

async fn wait_for_connected(
    events: &mut broadcast::Receiver<ClientEvent>,
) -> ClientResult<()> {
    loop {
        match events.recv().await {
            Ok(ClientEvent::Connected) => return Ok(()),
            Ok(ClientEvent::Error {
                kind,
                message,
                retry,
            }) if !retry.will_retry => {
                return Err(ClientError::Reported { kind, message });
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                return Err(ClientError::NotConnected);
            }
        }
    }
}

async fn wait_for_response(
    events: &mut broadcast::Receiver<ClientEvent>,
    artifact_id: &str,
) -> ClientResult<ServerFrame> {
    loop {
        match events.recv().await {
            Ok(ClientEvent::Message(InboundMessage::Response(frame)))
                if frame.req_id.as_deref() == Some(artifact_id) =>
            {
                return Ok(frame);
            }
            Ok(ClientEvent::Error {
                kind,
                message,
                retry,
            }) if !retry.will_retry => {
                return Err(ClientError::Reported { kind, message });
            }
            Ok(ClientEvent::End { .. }) | Ok(ClientEvent::Close) => {
                return Err(ClientError::NotConnected);
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                return Err(ClientError::NotConnected);
            }
        }
    }
}
