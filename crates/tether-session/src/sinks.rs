//! Response sinks: one-shot request registry and the streaming buffer.
//!
//! The wire protocol carries no correlation ids, so inbound content is
//! attributed by arrival order: while one-shot requests are pending, deltas
//! feed the oldest one; otherwise they belong to the ambient snapshot
//! conversation and accumulate in the [`CompletionBuffer`]. Requests are
//! still keyed by [`RequestId`] so timeouts and cancellation can target a
//! specific entry regardless of its queue position.

use std::collections::{HashMap, VecDeque};

use tokio::sync::oneshot;
use tracing::debug;

use tether_core::{RequestId, Result, TetherError};

/// Resolution channel for one one-shot request.
pub type ResponseTx = oneshot::Sender<Result<String>>;

struct PendingEntry {
    tx: ResponseTx,
    buffer: String,
}

/// In-flight one-shot requests, resolved in FIFO order.
#[derive(Default)]
pub struct PendingRequests {
    entries: HashMap<RequestId, PendingEntry>,
    order: VecDeque<RequestId>,
}

impl PendingRequests {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of in-flight requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no request is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Register a request.
    pub fn insert(&mut self, id: RequestId, tx: ResponseTx) {
        self.order.push_back(id.clone());
        let _ = self.entries.insert(id, PendingEntry {
            tx,
            buffer: String::new(),
        });
    }

    /// Append delta text to the oldest pending request.
    ///
    /// Returns `false` when nothing is pending (the delta belongs to the
    /// streaming conversation instead).
    pub fn append_front(&mut self, text: &str) -> bool {
        let Some(id) = self.order.front() else {
            return false;
        };
        if let Some(entry) = self.entries.get_mut(id) {
            entry.buffer.push_str(text);
        }
        true
    }

    /// Resolve the oldest pending request with its accumulated text.
    pub fn complete_front(&mut self) -> Option<RequestId> {
        let id = self.order.pop_front()?;
        if let Some(entry) = self.entries.remove(&id) {
            let _ = entry.tx.send(Ok(entry.buffer));
        }
        Some(id)
    }

    /// Reject the oldest pending request.
    pub fn fail_front(&mut self, err: TetherError) -> Option<RequestId> {
        let id = self.order.pop_front()?;
        if let Some(entry) = self.entries.remove(&id) {
            let _ = entry.tx.send(Err(err));
        }
        Some(id)
    }

    /// Reject a specific request by id (the timeout path).
    ///
    /// Returns `false` when the request already resolved.
    pub fn fail(&mut self, id: &RequestId, err: TetherError) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        self.order.retain(|queued| queued != id);
        let _ = entry.tx.send(Err(err));
        true
    }

    /// Reject every pending request, draining the registry.
    pub fn fail_all(&mut self, make_err: impl Fn() -> TetherError) {
        if !self.order.is_empty() {
            debug!(count = self.order.len(), "rejecting all pending requests");
        }
        while let Some(id) = self.order.pop_front() {
            if let Some(entry) = self.entries.remove(&id) {
                let _ = entry.tx.send(Err(make_err()));
            }
        }
    }
}

/// Accumulates streamed deltas of the ambient conversation until the model's
/// turn completes.
///
/// The buffer is anchored to the cursor position of the snapshot that
/// prompted it. The accumulated text is only offered as an inline completion
/// at the exact position where it would land — the anchor advanced by the
/// buffered text. Any divergence (the user moved or typed elsewhere)
/// invalidates the buffer.
#[derive(Debug, Default)]
pub struct CompletionBuffer {
    text: String,
    anchor: Option<(usize, usize)>,
}

impl CompletionBuffer {
    /// Empty, unanchored buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-anchor at `(line, character)`, discarding accumulated text. Called
    /// when a new snapshot is sent.
    pub fn set_anchor(&mut self, line: usize, character: usize) {
        self.text.clear();
        self.anchor = Some((line, character));
    }

    /// Append a delta.
    pub fn push(&mut self, delta: &str) {
        self.text.push_str(delta);
    }

    /// Take the accumulated text, leaving the buffer empty and unanchored.
    pub fn take(&mut self) -> String {
        self.anchor = None;
        std::mem::take(&mut self.text)
    }

    /// Discard accumulated text and the anchor.
    pub fn clear(&mut self) {
        self.text.clear();
        self.anchor = None;
    }

    /// Whether anything has accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Position where the buffered text currently ends: the anchor advanced
    /// line-by-line through the buffer.
    fn expected_position(&self) -> Option<(usize, usize)> {
        let (line, character) = self.anchor?;
        let newlines = self.text.matches('\n').count();
        let trailing = self.text.rsplit('\n').next().unwrap_or("").chars().count();
        if newlines == 0 {
            Some((line, character + trailing))
        } else {
            Some((line + newlines, trailing))
        }
    }

    /// The buffered completion, valid only at the exact position the stream
    /// has reached. A diverging query invalidates the buffer.
    pub fn completion_at(&mut self, line: usize, character: usize) -> Option<&str> {
        if self.text.is_empty() {
            return None;
        }
        match self.expected_position() {
            Some(expected) if expected == (line, character) => Some(&self.text),
            Some(_) => {
                self.clear();
                None
            }
            None => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
