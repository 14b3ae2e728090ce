//! # tether-protocol
//!
//! Wire protocol types and pure snapshot builders for the Tether session core.
//!
//! The remote generation service speaks JSON over a single bidirectional
//! socket in two shapes at once: a current `clientContent`/`serverContent`
//! shape and a legacy `generateContentRequest`/`generateContentResponse`
//! shape. Both map onto one [`Envelope`] (outbound) / [`Frame`] (inbound)
//! pair so nothing above this crate cares which shape arrived.
//!
//! Snapshot builders ([`snapshot`]) and prompt templates ([`prompts`]) are
//! pure functions with no I/O.

#![deny(unsafe_code)]

pub mod envelope;
pub mod frame;
pub mod prompts;
pub mod snapshot;

pub use envelope::{ContentPart, Envelope, SetupConfig, Turn};
pub use frame::{decode_frame, Frame};
