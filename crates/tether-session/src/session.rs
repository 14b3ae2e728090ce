//! Session actor — one logical conversation across socket lifetimes.
//!
//! The actor owns the transport, the reconnection controller, the keep-alive
//! keeper, and both response sinks. Everything else talks to it through a
//! [`SessionHandle`] over a command channel, so there is no shared mutable
//! connection state. Connection progress is an explicit state machine:
//!
//! ```text
//! Disconnected → Connecting → AwaitingSetup → Ready
//!       ↑                                       │
//!       └────────── Reconnecting ←──────────────┘   (abnormal close)
//! ```
//!
//! `stop()` is terminal from any state.

use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tether_core::{RequestId, Result, TetherError};
use tether_protocol::{Envelope, Frame, SetupConfig};
use tether_settings::{TetherSettings, PLACEHOLDER_CREDENTIAL};

use crate::keepalive::run_keepalive;
use crate::reconnect::{ReconnectController, ReconnectDecision};
use crate::sinks::{CompletionBuffer, PendingRequests, ResponseTx};
use crate::transport::{Transport, TransportEvent, NORMAL_CLOSE};

/// Connection progress of the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected and not trying to be.
    Disconnected,
    /// Dialing the service.
    Connecting,
    /// Socket open; setup sent, acknowledgement outstanding.
    AwaitingSetup,
    /// Setup acknowledged; content may flow.
    Ready,
    /// Waiting out a backoff delay before redialing.
    Reconnecting,
    /// Stopped for good.
    Closed,
}

/// Events broadcast to session observers.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// Setup was acknowledged; the session is ready for content.
    Ready,
    /// A streamed delta of the ambient conversation.
    Delta {
        /// Fragment text.
        text: String,
    },
    /// The model's turn completed; `text` is the full accumulated output.
    Completed {
        /// Accumulated turn text.
        text: String,
    },
    /// The service reported an explicit error frame.
    ServiceError {
        /// Service-assigned code.
        code: i64,
        /// Message text.
        message: String,
    },
    /// The connection dropped. `clean` when the peer closed with code 1000.
    Disconnected {
        /// Whether this was a deliberate close.
        clean: bool,
    },
    /// A reconnection attempt is scheduled.
    Reconnecting {
        /// Zero-based attempt number.
        attempt: u32,
        /// Backoff delay before dialing, in ms.
        delay_ms: u64,
    },
    /// The reconnection budget is spent; manual restart required.
    ReconnectExhausted {
        /// Attempts made before giving up.
        attempts: u32,
    },
    /// The session was stopped.
    Closed,
}

/// How a send interacts with the live completion buffer.
#[derive(Clone, Copy, Debug)]
enum SendKind {
    /// Plain conversational send.
    Plain,
    /// Context snapshot: discards any partially streamed output.
    Snapshot,
    /// Editor snapshot anchored at a cursor position, so the streamed reply
    /// can be offered as an inline completion there.
    AnchoredSnapshot { line: usize, character: usize },
}

enum Command {
    Start {
        ack: oneshot::Sender<Result<()>>,
    },
    Send {
        envelope: Envelope,
        kind: SendKind,
        ack: oneshot::Sender<Result<()>>,
    },
    Request {
        envelope: Envelope,
        tx: ResponseTx,
    },
    CompletionAt {
        line: usize,
        character: usize,
        tx: oneshot::Sender<Option<String>>,
    },
    State {
        tx: oneshot::Sender<SessionState>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
    // internal
    RequestTimeout(RequestId),
    Dial,
    Dialed(Result<Transport>),
}

/// Upper bound on one connect attempt, so a peer that accepts TCP but never
/// completes the handshake cannot pin the dial forever.
const CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Cloneable handle to a running session actor.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Spawn a session actor for the given settings and credential.
    ///
    /// The actor starts disconnected; call [`SessionHandle::start`] to dial.
    #[must_use]
    pub fn spawn(settings: TetherSettings, credential: &str) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (events, _) = broadcast::channel(64);
        let actor = SessionActor::new(settings, credential, cmd_tx.clone(), events.clone());
        drop(tokio::spawn(actor.run(cmd_rx)));
        Self { cmd_tx, events }
    }

    /// Subscribe to session events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Begin connecting.
    ///
    /// Fails fast with [`TetherError::Config`] when the credential is absent
    /// or still the placeholder. Idempotent while a connection is live.
    pub async fn start(&self) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Start { ack })
            .await
            .map_err(|_| TetherError::SessionClosed)?;
        rx.await.map_err(|_| TetherError::SessionClosed)?
    }

    /// Send an envelope on the live conversation.
    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        self.send_inner(envelope, SendKind::Plain).await
    }

    /// Send a context snapshot, discarding any partially streamed output
    /// from the previous snapshot.
    pub async fn send_snapshot(&self, envelope: Envelope) -> Result<()> {
        self.send_inner(envelope, SendKind::Snapshot).await
    }

    /// Send an editor snapshot anchored at the cursor, so the streamed reply
    /// becomes available via [`SessionHandle::completion_at`].
    pub async fn send_anchored_snapshot(
        &self,
        envelope: Envelope,
        line: usize,
        character: usize,
    ) -> Result<()> {
        self.send_inner(envelope, SendKind::AnchoredSnapshot { line, character })
            .await
    }

    async fn send_inner(&self, envelope: Envelope, kind: SendKind) -> Result<()> {
        let (ack, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Send { envelope, kind, ack })
            .await
            .map_err(|_| TetherError::SessionClosed)?;
        rx.await.map_err(|_| TetherError::SessionClosed)?
    }

    /// The streamed inline completion valid at exactly `(line, character)`,
    /// if any.
    pub async fn completion_at(&self, line: usize, character: usize) -> Result<Option<String>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::CompletionAt { line, character, tx })
            .await
            .map_err(|_| TetherError::SessionClosed)?;
        rx.await.map_err(|_| TetherError::SessionClosed)
    }

    /// Issue a one-shot request and await its full response text.
    ///
    /// Fails with [`TetherError::RequestTimeout`] if the configured deadline
    /// elapses first.
    pub async fn request(&self, envelope: Envelope) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Request { envelope, tx })
            .await
            .map_err(|_| TetherError::SessionClosed)?;
        rx.await.map_err(|_| TetherError::SessionClosed)?
    }

    /// Current connection state.
    pub async fn state(&self) -> Result<SessionState> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::State { tx })
            .await
            .map_err(|_| TetherError::SessionClosed)?;
        rx.await.map_err(|_| TetherError::SessionClosed)
    }

    /// Stop the session for good. Idempotent.
    pub async fn stop(&self) {
        let (ack, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Stop { ack }).await.is_ok() {
            let _ = rx.await;
        }
    }
}

struct SessionActor {
    settings: TetherSettings,
    url: String,
    credential_error: Option<String>,
    state: SessionState,
    cmd_tx: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
    transport_events: mpsc::Receiver<TransportEvent>,
    transport_event_tx: mpsc::Sender<TransportEvent>,
    transport: Option<Transport>,
    pending: PendingRequests,
    completion: CompletionBuffer,
    reconnect: ReconnectController,
    keepalive_cancel: Option<CancellationToken>,
    keepalive_task: Option<JoinHandle<()>>,
}

impl SessionActor {
    fn new(
        settings: TetherSettings,
        credential: &str,
        cmd_tx: mpsc::Sender<Command>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let url = settings.service.url_with_key(credential);
        let credential_error = if credential.is_empty() {
            Some("service credential is not set".to_string())
        } else if credential == PLACEHOLDER_CREDENTIAL {
            Some("service credential is still the placeholder value".to_string())
        } else {
            None
        };
        let reconnect = ReconnectController::new(settings.reconnect.clone());
        let (transport_event_tx, transport_events) = mpsc::channel(64);
        Self {
            settings,
            url,
            credential_error,
            state: SessionState::Disconnected,
            cmd_tx,
            events,
            transport_events,
            transport_event_tx,
            transport: None,
            pending: PendingRequests::new(),
            completion: CompletionBuffer::new(),
            reconnect,
            keepalive_cancel: None,
            keepalive_task: None,
        }
    }

    async fn run(mut self, mut cmd_rx: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if self.handle_command(cmd).await {
                        break;
                    }
                }
                event = self.transport_events.recv() => {
                    // Never None: the actor keeps a sender clone.
                    if let Some(event) = event {
                        self.handle_transport_event(event).await;
                    }
                }
            }
        }
        self.teardown().await;
    }

    /// Returns `true` when the actor should exit.
    async fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Start { ack } => {
                if let Some(reason) = &self.credential_error {
                    let _ = ack.send(Err(TetherError::Config(reason.clone())));
                    return false;
                }
                if matches!(self.state, SessionState::Disconnected) {
                    self.dial();
                }
                let _ = ack.send(Ok(()));
            }
            Command::Dial => {
                if matches!(self.state, SessionState::Reconnecting) {
                    self.reconnect.on_attempt_started();
                    self.dial();
                }
            }
            Command::Dialed(result) => {
                self.handle_dialed(result).await;
            }
            Command::Send { envelope, kind, ack } => {
                let _ = ack.send(self.do_send(envelope, kind).await);
            }
            Command::Request { envelope, tx } => {
                self.do_request(envelope, tx).await;
            }
            Command::CompletionAt { line, character, tx } => {
                let _ = tx.send(
                    self.completion
                        .completion_at(line, character)
                        .map(str::to_owned),
                );
            }
            Command::RequestTimeout(id) => {
                let timeout_ms = self.settings.dispatch.request_timeout_ms;
                if self.pending.fail(&id, TetherError::RequestTimeout { timeout_ms }) {
                    warn!(%id, timeout_ms, "one-shot request timed out");
                }
            }
            Command::State { tx } => {
                let _ = tx.send(self.state);
            }
            Command::Stop { ack } => {
                let _ = ack.send(());
                return true;
            }
        }
        false
    }

    async fn do_send(&mut self, envelope: Envelope, kind: SendKind) -> Result<()> {
        if self.state != SessionState::Ready {
            // A send against a dead session revives it (bounded by the
            // reconnect budget) rather than silently dropping traffic.
            if self.state == SessionState::Disconnected
                && self.reconnect.state() != crate::reconnect::ReconnectState::Exhausted
                && self.credential_error.is_none()
            {
                self.dial();
            }
            return Err(TetherError::NotConnected);
        }
        let Some(transport) = &self.transport else {
            return Err(TetherError::NotConnected);
        };
        match kind {
            SendKind::Plain => {}
            SendKind::Snapshot => self.completion.clear(),
            SendKind::AnchoredSnapshot { line, character } => {
                self.completion.set_anchor(line, character);
            }
        }
        transport.sender().send(envelope).await
    }

    async fn do_request(&mut self, envelope: Envelope, tx: ResponseTx) {
        if self.state != SessionState::Ready {
            let _ = tx.send(Err(TetherError::NotConnected));
            return;
        }
        let Some(transport) = &self.transport else {
            let _ = tx.send(Err(TetherError::NotConnected));
            return;
        };
        if let Err(e) = transport.sender().send(envelope).await {
            let _ = tx.send(Err(e));
            return;
        }

        let id = RequestId::new();
        debug!(%id, "one-shot request issued");
        self.pending.insert(id.clone(), tx);

        // Stale timers are harmless: failing a resolved id is a no-op.
        let timeout = Duration::from_millis(self.settings.dispatch.request_timeout_ms);
        let cmd_tx = self.cmd_tx.clone();
        drop(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = cmd_tx.send(Command::RequestTimeout(id)).await;
        }));
    }

    /// Begin a connect attempt without blocking the actor.
    ///
    /// The handshake runs in its own task; the outcome comes back as
    /// [`Command::Dialed`], so `state()`, `send()`, and `stop()` stay
    /// responsive while the dial is in flight.
    fn dial(&mut self) {
        self.state = SessionState::Connecting;
        info!(url = %self.settings.service.endpoint, "connecting");
        let url = self.url.clone();
        let event_tx = self.transport_event_tx.clone();
        let cmd_tx = self.cmd_tx.clone();
        let deadline = Duration::from_millis(CONNECT_TIMEOUT_MS);
        drop(tokio::spawn(async move {
            let result = match tokio::time::timeout(deadline, Transport::connect(&url, event_tx))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(TetherError::Transport("connect timed out".into())),
            };
            if let Err(unsent) = cmd_tx.send(Command::Dialed(result)).await {
                // Actor is gone; don't leak the socket task.
                if let Command::Dialed(Ok(transport)) = unsent.0 {
                    transport.abort();
                }
            }
        }));
    }

    async fn handle_dialed(&mut self, result: Result<Transport>) {
        if self.state != SessionState::Connecting {
            // The session moved on (stopped or re-dialed); discard the
            // late socket.
            if let Ok(transport) = result {
                transport.abort();
            }
            return;
        }
        match result {
            Ok(transport) => {
                self.reconnect.on_open();
                self.state = SessionState::AwaitingSetup;
                let setup = Envelope::Setup {
                    model: self.settings.service.model.clone(),
                    config: SetupConfig::default(),
                };
                if let Err(e) = transport.sender().send(setup).await {
                    warn!(error = %e, "setup send failed");
                }
                self.transport = Some(transport);
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                self.handle_disconnect(None).await;
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame(frame) => self.handle_frame(frame),
            TransportEvent::PeerPing => {}
            TransportEvent::TransportError(message) => {
                warn!(%message, "transport error");
            }
            TransportEvent::Closed { code, reason } => {
                debug!(?code, %reason, "socket closed");
                self.handle_disconnect(code).await;
            }
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        match frame {
            Frame::SetupAck => {
                if self.state == SessionState::AwaitingSetup {
                    info!("setup acknowledged");
                    self.state = SessionState::Ready;
                    self.start_keepalive();
                    let _ = self.events.send(SessionEvent::Ready);
                } else {
                    warn!(state = ?self.state, "unexpected setup acknowledgement");
                }
            }
            Frame::Error { code, message } => {
                warn!(code, %message, "service error frame");
                if self.pending.is_empty() {
                    // The failed generation belongs to the ambient stream;
                    // partial output spanning the error is worthless.
                    self.completion.clear();
                } else {
                    let _ = self.pending.fail_front(TetherError::Service {
                        code,
                        message: message.clone(),
                    });
                }
                let _ = self.events.send(SessionEvent::ServiceError { code, message });
            }
            Frame::ContentDelta { ref text, .. } => {
                let is_final = frame.is_final();
                if self.pending.is_empty() {
                    // Ambient conversation: stream and accumulate.
                    if !text.is_empty() {
                        self.completion.push(text);
                        let _ = self.events.send(SessionEvent::Delta { text: text.clone() });
                    }
                    if is_final && !self.completion.is_empty() {
                        let _ = self.events.send(SessionEvent::Completed {
                            text: self.completion.take(),
                        });
                    }
                } else {
                    // Attribute to the oldest one-shot request.
                    if !text.is_empty() {
                        let _ = self.pending.append_front(text);
                    }
                    if is_final {
                        let _ = self.pending.complete_front();
                    }
                }
            }
        }
    }

    async fn handle_disconnect(&mut self, code: Option<u16>) {
        self.stop_keepalive();
        self.transport = None;
        self.pending
            .fail_all(|| TetherError::Transport("connection lost".into()));

        let clean = code == Some(NORMAL_CLOSE);
        let _ = self.events.send(SessionEvent::Disconnected { clean });

        match self
            .reconnect
            .on_disconnect_with_random(code, rand::random::<f64>())
        {
            ReconnectDecision::Retry { attempt, delay_ms } => {
                self.state = SessionState::Reconnecting;
                info!(attempt, delay_ms, "scheduling reconnect");
                let _ = self
                    .events
                    .send(SessionEvent::Reconnecting { attempt, delay_ms });
                let cmd_tx = self.cmd_tx.clone();
                drop(tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    let _ = cmd_tx.send(Command::Dial).await;
                }));
            }
            ReconnectDecision::GiveUp => {
                let attempts = self.reconnect.attempts();
                warn!(attempts, "reconnection attempts exhausted");
                self.state = SessionState::Disconnected;
                let _ = self
                    .events
                    .send(SessionEvent::ReconnectExhausted { attempts });
            }
            ReconnectDecision::Stay => {
                if clean {
                    self.state = SessionState::Disconnected;
                }
            }
        }
    }

    fn start_keepalive(&mut self) {
        self.stop_keepalive();
        let Some(transport) = &self.transport else {
            return;
        };
        let cancel = CancellationToken::new();
        let variant = self.settings.keep_alive.variant;
        let interval = Duration::from_millis(self.settings.keep_alive.active_interval_ms());
        let sender = transport.sender();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let _ = run_keepalive(variant, interval, sender, token).await;
        });
        self.keepalive_cancel = Some(cancel);
        self.keepalive_task = Some(task);
    }

    fn stop_keepalive(&mut self) {
        if let Some(cancel) = self.keepalive_cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.keepalive_task.take() {
            task.abort();
        }
    }

    async fn teardown(&mut self) {
        self.stop_keepalive();
        if let Some(transport) = self.transport.take() {
            let _ = transport.sender().close().await;
        }
        self.pending.fail_all(|| TetherError::SessionClosed);
        self.completion.clear();
        self.state = SessionState::Closed;
        let _ = self.events.send(SessionEvent::Closed);
        info!("session stopped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> TetherSettings {
        let mut settings = TetherSettings::default();
        // Unroutable endpoint: any accidental dial fails fast.
        settings.service.endpoint = "ws://127.0.0.1:1".into();
        settings
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let handle = SessionHandle::spawn(test_settings(), "test-key");
        assert_eq!(handle.state().await.unwrap(), SessionState::Disconnected);
        handle.stop().await;
    }

    #[tokio::test]
    async fn placeholder_credential_fails_start() {
        let handle = SessionHandle::spawn(test_settings(), "AIza...");
        let err = handle.start().await.unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
        handle.stop().await;
    }

    #[tokio::test]
    async fn empty_credential_fails_start() {
        let handle = SessionHandle::spawn(test_settings(), "");
        let err = handle.start().await.unwrap_err();
        assert!(matches!(err, TetherError::Config(_)));
        handle.stop().await;
    }

    #[tokio::test]
    async fn completion_query_with_no_stream_is_none() {
        let handle = SessionHandle::spawn(test_settings(), "test-key");
        assert!(handle.completion_at(0, 0).await.unwrap().is_none());
        handle.stop().await;
    }

    #[tokio::test]
    async fn send_before_start_is_rejected() {
        let handle = SessionHandle::spawn(test_settings(), "test-key");
        let err = handle.send(Envelope::KeepAlive).await.unwrap_err();
        assert!(matches!(err, TetherError::NotConnected));
        handle.stop().await;
    }

    #[tokio::test]
    async fn request_before_start_is_rejected() {
        let handle = SessionHandle::spawn(test_settings(), "test-key");
        let err = handle
            .request(Envelope::ContentTurn {
                turns: vec![],
                turn_complete: true,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TetherError::NotConnected));
        handle.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let handle = SessionHandle::spawn(test_settings(), "test-key");
        let mut events = handle.subscribe();
        handle.stop().await;
        handle.stop().await;
        assert!(matches!(events.recv().await, Ok(SessionEvent::Closed)));
        // The actor is gone; commands fail closed.
        assert!(matches!(
            handle.state().await,
            Err(TetherError::SessionClosed)
        ));
    }

    #[tokio::test]
    async fn send_after_stop_reports_closed() {
        let handle = SessionHandle::spawn(test_settings(), "test-key");
        handle.stop().await;
        let err = handle.send(Envelope::KeepAlive).await.unwrap_err();
        assert!(matches!(err, TetherError::SessionClosed));
    }
}
