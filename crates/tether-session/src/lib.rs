//! # tether-session
//!
//! The resilient streaming session: one logical conversation with a remote
//! generative service, kept alive across an unreliable WebSocket.
//!
//! Layering, bottom up:
//!
//! - [`transport`] — one socket, one task, decoded frames out
//! - [`reconnect`] — pure backoff/attempt state machine
//! - [`keepalive`] — periodic liveness signal on an open socket
//! - [`sinks`] — one-shot request registry and the streaming buffer
//! - [`session`] — the actor tying those together behind [`SessionHandle`]
//! - [`host`] / [`dispatch`] — editor-facing events in, results out

#![deny(unsafe_code)]

pub mod dispatch;
pub mod host;
pub mod keepalive;
pub mod reconnect;
pub mod session;
pub mod sinks;
pub mod transport;

pub use dispatch::run_dispatcher;
pub use host::{EditorHost, HostEvent, Position, Range};
pub use session::{SessionEvent, SessionHandle, SessionState};
pub use transport::TransportEvent;
