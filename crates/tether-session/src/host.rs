//! Editor host abstraction.
//!
//! The session core never talks to an editor directly; the embedding layer
//! feeds [`HostEvent`]s in and implements [`EditorHost`] for everything the
//! core wants shown or changed. Tests drive both ends with plain structs.

/// A zero-based position in a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Position {
    /// Zero-based line.
    pub line: u32,
    /// Zero-based character offset within the line.
    pub character: u32,
}

impl Position {
    /// Convenience constructor.
    #[must_use]
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// A half-open range in a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    /// Inclusive start.
    pub start: Position,
    /// Exclusive end.
    pub end: Position,
}

impl Range {
    /// Convenience constructor.
    #[must_use]
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Editor-side occurrences the dispatcher reacts to.
#[derive(Clone, Debug)]
pub enum HostEvent {
    /// Start (or restart) the session.
    StartSession,
    /// Stop the session for good.
    StopSession,
    /// The active document changed. Debounced before a snapshot is sent.
    DocumentChanged {
        /// Document URI.
        uri: String,
        /// Full document text.
        text: String,
        /// Zero-based cursor line.
        cursor_line: usize,
        /// Zero-based cursor character.
        cursor_character: usize,
    },
    /// The cursor moved without an edit. Shares the debounce slot with
    /// `DocumentChanged`.
    SelectionChanged {
        /// Document URI.
        uri: String,
        /// Full document text.
        text: String,
        /// Zero-based cursor line.
        cursor_line: usize,
        /// Zero-based cursor character.
        cursor_character: usize,
    },
    /// The document was saved. Snapshots immediately, skipping the debounce.
    DocumentSaved {
        /// Document URI.
        uri: String,
        /// Full document text.
        text: String,
        /// Zero-based cursor line.
        cursor_line: usize,
        /// Zero-based cursor character.
        cursor_character: usize,
    },
    /// A terminal came into focus; accumulated output resets.
    TerminalOpened,
    /// A chunk of terminal output arrived.
    TerminalData {
        /// Raw output text.
        text: String,
    },
    /// Toggle terminal monitoring.
    TerminalMonitor(bool),
    /// The user asked to fix the selected code.
    FixSelection {
        /// Document URI.
        uri: String,
        /// Selection to replace on success.
        range: Range,
        /// Selected source text.
        text: String,
    },
    /// The user asked to explain the selected code.
    ExplainSelection {
        /// Selected source text.
        text: String,
    },
}

/// What the session core needs from the embedding editor.
pub trait EditorHost: Send + Sync {
    /// Show an informational message.
    fn show_info(&self, message: &str);

    /// Show an error message.
    fn show_error(&self, message: &str);

    /// Replace `range` in the document at `uri` with `new_text`.
    /// Returns `false` when the edit could not be applied.
    fn apply_edit(&self, uri: &str, range: &Range, new_text: &str) -> bool;

    /// Present rendered markdown in a dedicated panel.
    fn show_panel(&self, title: &str, markdown: &str);
}
