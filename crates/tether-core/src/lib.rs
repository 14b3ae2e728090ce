//! # tether-core
//!
//! Foundation types for the Tether session core.
//!
//! This crate provides the shared vocabulary the other Tether crates depend on:
//!
//! - **Errors**: `TetherError` hierarchy via `thiserror`, with retryability
//!   classification driving the reconnect policy
//! - **Branded IDs**: `RequestId` newtype for one-shot request tracking
//! - **Backoff**: exponential backoff math with cap and jitter, pure and sync
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod backoff;
pub mod constants;
pub mod errors;
pub mod ids;
pub mod logging;

pub use errors::{Result, TetherError};
pub use ids::RequestId;
