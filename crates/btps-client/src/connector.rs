//! The client connector
//!
//! A TLS-dialing, DNS-resolving, retrying, backpressure-aware transport
//! for one recipient at a time. The lifecycle is a small state machine:
//!
//! ```text
//! Idle → Resolving → Connecting → Ready → Sending → AwaitingResponse
//!                                   │
//!                                   └──→ Closing → Closed
//! ```
//!
//! with `Destroyed` as the terminal sink. Everything observable flows
//! through the typed event stream (see [`ClientEvent`]); failures carry
//! a [`RetryInfo`] telling the caller whether the connector will re-run
//! the connect pipeline on its own.
//!
//! Per-connection invariants: at most one TLS socket, at most one
//! outstanding retry timer, events delivered in occurrence order, and no
//! event after destruction.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, instrument, warn};

use btps_core::{ArtifactEnvelope, Identity, InboundFrame};
use btps_crypto::KeyPair;
use btps_resolver::{AddressParts, DnsResolver, HostResolver};

use crate::codec::{sign_encrypt, verify_decrypt, CryptoOptions};
use crate::error::{ClientError, ClientResult, ErrorKind};
use crate::events::{ClientEvent, InboundMessage};
use crate::options::BtpsClientOptions;
use crate::queue::{OutboundLine, SendQueue, WriteOutcome};
use crate::retry::{retry_info, RetryInfo, RetryPolicy};
use crate::tls;

/// Event channel capacity. Slow subscribers that fall further behind
/// than this observe a lag error, never a blocked connector.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connector lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Resolving,
    Connecting,
    Ready,
    Sending,
    AwaitingResponse,
    Closing,
    Closed,
    Destroyed,
}

enum Command {
    Send(OutboundLine),
    End,
}

struct Shared {
    options: BtpsClientOptions,
    keys: KeyPair,
    resolver: Arc<dyn HostResolver>,
    policy: RetryPolicy,
    state: std::sync::Mutex<ConnectionState>,
    event_tx: broadcast::Sender<ClientEvent>,
    destroyed: AtomicBool,
    attempts: AtomicU32,
    cmd_tx: std::sync::Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

impl Shared {
    fn emit(&self, event: ClientEvent) {
        if !self.destroyed.load(Ordering::SeqCst) {
            let _ = self.event_tx.send(event);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let mut guard = self.state.lock().expect("state lock poisoned");
        if *guard != ConnectionState::Destroyed {
            *guard = state;
        }
    }

    fn current_state(&self) -> ConnectionState {
        *self.state.lock().expect("state lock poisoned")
    }

    fn retry_info_for(&self, error: Option<&ClientError>) -> RetryInfo {
        retry_info(
            &self.policy,
            self.attempts.load(Ordering::SeqCst),
            self.destroyed.load(Ordering::SeqCst),
            error,
        )
    }

    fn session_sender(&self) -> Option<mpsc::UnboundedSender<Command>> {
        self.cmd_tx.lock().expect("cmd lock poisoned").clone()
    }
}

/// The BTPS client connector.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct BtpsClient {
    shared: Arc<Shared>,
    conn_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtpsClient {
    /// Create a connector using the default DNS resolver.
    pub fn new(options: BtpsClientOptions) -> ClientResult<Self> {
        Self::with_resolver(options, Arc::new(DnsResolver::new()))
    }

    /// Create a connector with an injected resolver (tests, caching
    /// layers).
    pub fn with_resolver(
        options: BtpsClientOptions,
        resolver: Arc<dyn HostResolver>,
    ) -> ClientResult<Self> {
        let keys = KeyPair::from_pem(options.btp_identity_key.expose_secret())?;
        let policy = RetryPolicy {
            max_retries: options.max_retries,
            base_delay: Duration::from_millis(options.retry_delay_ms),
        };
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            shared: Arc::new(Shared {
                options,
                keys,
                resolver,
                policy,
                state: std::sync::Mutex::new(ConnectionState::Idle),
                event_tx,
                destroyed: AtomicBool::new(false),
                attempts: AtomicU32::new(0),
                cmd_tx: std::sync::Mutex::new(None),
            }),
            conn_task: Mutex::new(None),
        })
    }

    /// Subscribe to the event stream. Events are broadcast to every
    /// subscriber in occurrence order.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.shared.current_state()
    }

    /// Open a connection to a recipient identity (`account$domain`).
    ///
    /// Returns immediately; progress and failures arrive as events.
    /// A no-op when destroyed or when a connection is already active.
    #[instrument(skip(self))]
    pub async fn connect(&self, recipient: &str) {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return;
        }
        match self.shared.current_state() {
            ConnectionState::Idle | ConnectionState::Closed => {}
            state => {
                warn!(?state, "connect() ignored, connection already active");
                return;
            }
        }

        self.shared.attempts.store(0, Ordering::SeqCst);
        let shared = Arc::clone(&self.shared);
        let recipient = recipient.to_string();
        let handle = tokio::spawn(async move {
            run_connection(shared, recipient).await;
        });
        *self.conn_task.lock().await = Some(handle);
    }

    /// Sign an artifact and queue it on the open connection. Returns
    /// the artifact id; `message-sent` is emitted once the line reaches
    /// the socket.
    pub async fn send(&self, envelope: ArtifactEnvelope) -> ClientResult<String> {
        self.send_with(envelope, &CryptoOptions::default()).await
    }

    /// Like [`send`](Self::send), with explicit encryption options.
    pub async fn send_with(
        &self,
        envelope: ArtifactEnvelope,
        crypto: &CryptoOptions,
    ) -> ClientResult<String> {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return Err(ClientError::Destroyed);
        }
        let tx = self
            .shared
            .session_sender()
            .ok_or(ClientError::NotConnected)?;

        self.shared.set_state(ConnectionState::Sending);
        let prepared = match sign_encrypt(
            envelope,
            &self.shared.keys,
            &self.shared.options.selector,
            self.shared.resolver.as_ref(),
            crypto,
        )
        .await
        {
            Ok(prepared) => prepared,
            Err(e) => {
                self.shared.set_state(ConnectionState::Ready);
                return Err(e);
            }
        };

        let id = prepared.id.clone();
        let mut line = serde_json::to_string(&prepared)
            .map_err(|e| ClientError::Syntax(e.to_string()))?;
        line.push('\n');

        tx.send(Command::Send(OutboundLine::new(id.clone(), line)))
            .map_err(|_| ClientError::NotConnected)?;
        self.shared.set_state(ConnectionState::AwaitingResponse);
        Ok(id)
    }

    /// Gracefully close: flush the queue, shut the socket down, emit
    /// `end` and `close`. Idempotent.
    pub async fn end(&self) {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return;
        }
        let handle = self.conn_task.lock().await.take();

        match self.shared.session_sender() {
            Some(tx) => {
                self.shared.set_state(ConnectionState::Closing);
                let _ = tx.send(Command::End);
                if let Some(handle) = handle {
                    let _ = handle.await;
                }
            }
            None => {
                // Nothing in flight; tear down whatever pre-connection
                // task might still be retrying.
                if let Some(handle) = handle {
                    handle.abort();
                }
                if !matches!(
                    self.shared.current_state(),
                    ConnectionState::Idle | ConnectionState::Closed
                ) {
                    self.shared.set_state(ConnectionState::Closed);
                    let info = self.shared.retry_info_for(None);
                    self.shared.emit(ClientEvent::End { retry: info });
                    self.shared.emit(ClientEvent::Close);
                } else {
                    self.shared.set_state(ConnectionState::Closed);
                }
            }
        }
    }

    /// Tear everything down: socket, queue, timers, subscribers. After
    /// this no event is ever emitted again and `connect` is a no-op.
    /// Idempotent.
    pub async fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Destroying BTPS client");
        *self.shared.state.lock().expect("state lock poisoned") = ConnectionState::Destroyed;
        // Dropping the sender closes the writer's channel; its queue is
        // discarded with it.
        *self.shared.cmd_tx.lock().expect("cmd lock poisoned") = None;
        if let Some(handle) = self.conn_task.lock().await.take() {
            handle.abort();
        }
    }
}

/// Connect-with-retry loop. Owns the connection for its whole life.
async fn run_connection(shared: Arc<Shared>, recipient: String) {
    loop {
        if shared.destroyed.load(Ordering::SeqCst) {
            return;
        }

        match connect_once(&shared, &recipient).await {
            Ok(stream) => {
                shared.attempts.store(0, Ordering::SeqCst);
                let outcome = run_session(&shared, stream).await;
                if shared.destroyed.load(Ordering::SeqCst) {
                    return;
                }

                let info = shared.retry_info_for(outcome.as_ref());
                if let Some(err) = &outcome {
                    shared.emit(ClientEvent::Error {
                        kind: err.kind(),
                        message: err.to_string(),
                        retry: info.clone(),
                    });
                }
                shared.set_state(ConnectionState::Closing);
                shared.set_state(ConnectionState::Closed);
                shared.emit(ClientEvent::End {
                    retry: info.clone(),
                });
                shared.emit(ClientEvent::Close);

                match outcome {
                    Some(_) if info.will_retry => {
                        let attempt = shared.attempts.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(shared.policy.delay_after(attempt)).await;
                    }
                    _ => return,
                }
            }
            Err(err) => {
                let info = shared.retry_info_for(Some(&err));
                debug!(error = %err, will_retry = info.will_retry, "Connect attempt failed");
                shared.emit(ClientEvent::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                    retry: info.clone(),
                });
                if !info.will_retry {
                    shared.set_state(ConnectionState::Closed);
                    return;
                }
                let attempt = shared.attempts.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(shared.policy.delay_after(attempt)).await;
            }
        }
    }
}

/// One pass through the connect pipeline: parse, resolve, dial, shake
/// hands. Any failure restarts the whole pipeline on retry.
async fn connect_once(
    shared: &Arc<Shared>,
    recipient: &str,
) -> ClientResult<TlsStream<TcpStream>> {
    shared.set_state(ConnectionState::Resolving);

    let to = Identity::parse(recipient)
        .map_err(|_| ClientError::InvalidIdentity(recipient.to_string()))?;

    let address = match &shared.options.host {
        Some(host) => {
            let mut address = AddressParts::parse(host)?;
            if let Some(port) = shared.options.port {
                address.port = port;
            }
            address
        }
        None => {
            shared
                .resolver
                .resolve_host(to.domain())
                .await?
                .address
        }
    };

    shared.set_state(ConnectionState::Connecting);
    debug!(address = %address, "Dialing");

    let connector = tls::build_connector(&shared.options.tls)?;
    let server_name = tls::server_name(&address.host)?;
    let timeout = Duration::from_millis(shared.options.connection_timeout_ms);

    let dial = async {
        let tcp = TcpStream::connect((address.host.as_str(), address.port))
            .await
            .map_err(|e| ClientError::Socket(e.to_string()))?;
        connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| ClientError::Tls(e.to_string()))
    };

    match tokio::time::timeout(timeout, dial).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::ConnectionTimeout(
            shared.options.connection_timeout_ms,
        )),
    }
}

/// Run one established connection until it ends. Returns the error that
/// ended it, or `None` for a clean end.
async fn run_session(
    shared: &Arc<Shared>,
    stream: TlsStream<TcpStream>,
) -> Option<ClientError> {
    let (read_half, write_half) = tokio::io::split(stream);

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    *shared.cmd_tx.lock().expect("cmd lock poisoned") = Some(cmd_tx);

    shared.set_state(ConnectionState::Ready);
    shared.emit(ClientEvent::Connected);
    info!("Connection ready");

    let writer = tokio::spawn(run_writer(Arc::clone(shared), write_half, cmd_rx));
    let outcome = read_loop(shared, read_half).await;

    *shared.cmd_tx.lock().expect("cmd lock poisoned") = None;
    let _ = writer.await;
    outcome
}

/// Upper bound on bytes handed to the transport per drain cycle. Past
/// it the queue's sink reports full and the remainder stays queued for
/// the next cycle.
const DRAIN_BATCH_BYTES: usize = 64 * 1024;

/// Writer half: stages queued lines through [`SendQueue::flush`] one
/// drain cycle at a time and writes each batch to the socket, emitting
/// `message-sent` per line. Lines arriving while a batch is in flight
/// wait in the queue and leave in FIFO order.
async fn run_writer(
    shared: Arc<Shared>,
    mut write_half: WriteHalf<TlsStream<TcpStream>>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut queue = SendQueue::new();
    let mut ending = false;

    'session: loop {
        if queue.is_empty() && !ending {
            match cmd_rx.recv().await {
                Some(Command::Send(line)) => queue.push(line),
                Some(Command::End) => ending = true,
                None => break,
            }
        }

        // Lines that arrived while the last batch was being written.
        loop {
            match cmd_rx.try_recv() {
                Ok(Command::Send(line)) => queue.push(line),
                Ok(Command::End) => ending = true,
                Err(_) => break,
            }
        }

        // One drain cycle: the sink accepts lines until the batch
        // budget is spent, then reports full. An oversized first line
        // is always accepted so the queue cannot wedge.
        let mut budget = DRAIN_BATCH_BYTES;
        let mut first = true;
        let batch = queue.flush(|entry| {
            if first || entry.line.len() <= budget {
                first = false;
                budget = budget.saturating_sub(entry.line.len());
                WriteOutcome::Written
            } else {
                WriteOutcome::Full
            }
        });

        for entry in batch {
            match write_half.write_all(entry.line.as_bytes()).await {
                Ok(()) => {
                    shared.emit(ClientEvent::MessageSent {
                        artifact_id: entry.artifact_id,
                    });
                }
                Err(e) => {
                    let abandoned = queue.discard();
                    let err = ClientError::Socket(e.to_string());
                    warn!(error = %e, abandoned = abandoned.len(), "Write failed, discarding send queue");
                    let info = shared.retry_info_for(Some(&err));
                    shared.emit(ClientEvent::Error {
                        kind: err.kind(),
                        message: err.to_string(),
                        retry: info,
                    });
                    break 'session;
                }
            }
        }
        let _ = write_half.flush().await;

        if ending && queue.is_empty() {
            let _ = write_half.shutdown().await;
            break;
        }
    }
}

/// Reader half: bounded line framing, parse, verify, decrypt, validate,
/// emit. Returns the error that broke the stream, or `None` on clean
/// remote end.
async fn read_loop(
    shared: &Arc<Shared>,
    read_half: ReadHalf<TlsStream<TcpStream>>,
) -> Option<ClientError> {
    let mut reader = BufReader::new(read_half);
    let max = shared.options.max_line_bytes;
    let mut buf: Vec<u8> = Vec::new();

    loop {
        if shared.destroyed.load(Ordering::SeqCst) {
            return None;
        }

        buf.clear();
        let mut limited = (&mut reader).take((max + 1) as u64);
        let n = match limited.read_until(b'\n', &mut buf).await {
            Ok(n) => n,
            Err(e) => return Some(ClientError::Socket(e.to_string())),
        };

        if n == 0 {
            debug!("Remote end closed the connection");
            return None;
        }
        if buf.len() > max {
            return Some(ClientError::LineTooLong { max });
        }
        if buf.last() != Some(&b'\n') {
            // EOF mid-line; trailing whitespace is not an error.
            return if buf.iter().all(u8::is_ascii_whitespace) {
                None
            } else {
                Some(ClientError::Syntax(
                    "connection closed mid-line".to_string(),
                ))
            };
        }

        let line = match std::str::from_utf8(&buf) {
            Ok(s) => s.trim(),
            Err(e) => return Some(ClientError::Syntax(e.to_string())),
        };
        if line.is_empty() {
            continue;
        }

        match process_line(shared, line).await {
            Ok(message) => shared.emit(ClientEvent::Message(message)),
            Err(err) => {
                if err.kind() == ErrorKind::SyntaxError {
                    // Framing can no longer be trusted.
                    return Some(err);
                }
                // A bad artifact does not corrupt the stream; report it
                // and keep reading.
                let info = shared.retry_info_for(Some(&err));
                shared.emit(ClientEvent::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                    retry: info,
                });
            }
        }
    }
}

async fn process_line(shared: &Arc<Shared>, line: &str) -> ClientResult<InboundMessage> {
    match InboundFrame::decode(line) {
        Err(e) => Err(ClientError::Syntax(e.to_string())),
        Ok(InboundFrame::Response(frame)) => Ok(InboundMessage::Response(frame)),
        Ok(InboundFrame::Artifact(envelope)) => {
            let document = verify_decrypt(
                &envelope,
                shared.resolver.as_ref(),
                Some(&shared.options.identity),
                Some(shared.keys.private_key()),
                None,
            )
            .await?;
            Ok(InboundMessage::Artifact { envelope, document })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btps_resolver::StaticResolver;

    fn test_client() -> BtpsClient {
        let keys = KeyPair::generate(2048).unwrap();
        let options =
            BtpsClientOptions::builder("alice$a.example", keys.private_key_pem().unwrap())
                .build()
                .unwrap();
        BtpsClient::with_resolver(options, Arc::new(StaticResolver::new())).unwrap()
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let client = test_client();
        assert_eq!(client.state(), ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_send_without_connection_fails() {
        let client = test_client();
        let envelope = ArtifactEnvelope::new(
            btps_core::ArtifactType::Query,
            Identity::parse("alice$a.example").unwrap(),
            Identity::parse("bob$b.example").unwrap(),
            serde_json::json!({"query": {"status": "unpaid"}}),
        );
        assert!(matches!(
            client.send(envelope).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent_and_silences_events() {
        let client = test_client();
        let mut events = client.events();

        client.destroy().await;
        client.destroy().await;
        assert_eq!(client.state(), ConnectionState::Destroyed);

        // connect after destroy: no-op, no events, no panic.
        client.connect("bob$b.example").await;
        assert_eq!(client.state(), ConnectionState::Destroyed);
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_send_after_destroy_reports_destroyed() {
        let client = test_client();
        client.destroy().await;

        let envelope = ArtifactEnvelope::new(
            btps_core::ArtifactType::Query,
            Identity::parse("alice$a.example").unwrap(),
            Identity::parse("bob$b.example").unwrap(),
            serde_json::json!({"query": {"status": "unpaid"}}),
        );
        assert!(matches!(
            client.send(envelope).await,
            Err(ClientError::Destroyed)
        ));
    }

    #[tokio::test]
    async fn test_end_without_connection_is_quiet() {
        let client = test_client();
        client.end().await;
        assert_eq!(client.state(), ConnectionState::Closed);
    }
}
