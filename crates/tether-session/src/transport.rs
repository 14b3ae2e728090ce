//! WebSocket transport — thin wrapper over `tokio-tungstenite`.
//!
//! One [`Transport`] owns one socket. Inbound traffic is decoded and pushed
//! onto an event channel; outbound traffic goes through a command channel so
//! the socket halves live in a single task. Malformed inbound frames are
//! logged and dropped rather than tearing down the socket.

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use tether_core::{Result, TetherError};
use tether_protocol::{decode_frame, Envelope, Frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code for a deliberate, clean shutdown.
pub const NORMAL_CLOSE: u16 = 1000;

/// Lifecycle and traffic events emitted by a transport.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// A decoded inbound frame.
    Frame(Frame),
    /// The peer sent a protocol ping (a pong was already queued in reply).
    PeerPing,
    /// A socket-level failure. Always followed by `Closed`.
    TransportError(String),
    /// The socket is gone. `code` is `None` when the peer vanished without a
    /// close handshake.
    Closed {
        /// WebSocket close code, if the peer sent one.
        code: Option<u16>,
        /// Close reason text, possibly empty.
        reason: String,
    },
}

/// Outbound transport command.
pub(crate) enum Outbound {
    Envelope(Envelope),
    Ping,
    Close,
}

/// Cloneable write handle to an open transport.
#[derive(Clone)]
pub struct TransportSender {
    out_tx: mpsc::Sender<Outbound>,
}

impl TransportSender {
    /// Send an envelope over the socket.
    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        self.out_tx
            .send(Outbound::Envelope(envelope))
            .await
            .map_err(|_| TetherError::NotConnected)
    }

    /// Send a protocol-level ping frame.
    pub async fn ping(&self) -> Result<()> {
        self.out_tx
            .send(Outbound::Ping)
            .await
            .map_err(|_| TetherError::NotConnected)
    }

    /// Start a clean close handshake (code 1000).
    pub async fn close(&self) -> Result<()> {
        self.out_tx
            .send(Outbound::Close)
            .await
            .map_err(|_| TetherError::NotConnected)
    }
}

/// An open WebSocket transport.
pub struct Transport {
    sender: TransportSender,
    task: JoinHandle<()>,
}

impl Transport {
    /// Connect to `url` and start the socket task.
    ///
    /// On success the handshake is complete; frames and lifecycle events
    /// flow on `event_tx` until the socket dies.
    pub async fn connect(url: &str, event_tx: mpsc::Sender<TransportEvent>) -> Result<Self> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TetherError::Transport(format!("connect: {e}")))?;
        debug!("transport connected");

        let (out_tx, out_rx) = mpsc::channel::<Outbound>(64);
        let task = tokio::spawn(transport_loop(ws, out_rx, event_tx));

        Ok(Self {
            sender: TransportSender { out_tx },
            task,
        })
    }

    /// A cloneable write handle.
    #[must_use]
    pub fn sender(&self) -> TransportSender {
        self.sender.clone()
    }

    /// Abort the socket task without a close handshake.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Socket task: multiplexes outbound commands and inbound messages.
async fn transport_loop(
    ws: WsStream,
    mut out_rx: mpsc::Receiver<Outbound>,
    event_tx: mpsc::Sender<TransportEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                let Some(outbound) = outbound else {
                    // All senders dropped; close quietly.
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                let result = match outbound {
                    Outbound::Envelope(envelope) => {
                        ws_tx.send(Message::Text(envelope.to_text().into())).await
                    }
                    Outbound::Ping => ws_tx.send(Message::Ping(Vec::new().into())).await,
                    Outbound::Close => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "client shutdown".into(),
                        };
                        // Keep reading until the peer echoes the close.
                        let _ = ws_tx.send(Message::Close(Some(frame))).await;
                        continue;
                    }
                };
                if let Err(e) = result {
                    let _ = event_tx
                        .send(TransportEvent::TransportError(e.to_string()))
                        .await;
                    let _ = event_tx
                        .send(TransportEvent::Closed { code: None, reason: e.to_string() })
                        .await;
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match decode_frame(&text) {
                        Ok(frame) => {
                            let _ = event_tx.send(TransportEvent::Frame(frame)).await;
                        }
                        Err(e) => warn!(error = %e, "dropping undecodable frame"),
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws_tx.send(Message::Pong(payload)).await;
                        let _ = event_tx.send(TransportEvent::PeerPing).await;
                    }
                    Some(Ok(Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = match frame {
                            Some(f) => (Some(u16::from(f.code)), f.reason.to_string()),
                            None => (None, String::new()),
                        };
                        let _ = event_tx.send(TransportEvent::Closed { code, reason }).await;
                        break;
                    }
                    Some(Err(e)) => {
                        let _ = event_tx
                            .send(TransportEvent::TransportError(e.to_string()))
                            .await;
                        let _ = event_tx
                            .send(TransportEvent::Closed { code: None, reason: e.to_string() })
                            .await;
                        break;
                    }
                    None => {
                        let _ = event_tx
                            .send(TransportEvent::Closed {
                                code: None,
                                reason: "stream ended".into(),
                            })
                            .await;
                        break;
                    }
                }
            }
        }
    }
}

/// Detached sender plus its raw command receiver, for exercising loops that
/// only need the write handle.
#[cfg(test)]
pub(crate) fn test_channel() -> (TransportSender, mpsc::Receiver<Outbound>) {
    let (out_tx, out_rx) = mpsc::channel(8);
    (TransportSender { out_tx }, out_rx)
}
