//! Snapshot builders.
//!
//! Pure functions that turn editor/terminal state into text ready to be
//! wrapped in an envelope. The editor snapshot is a deliberately lossy
//! projection: a bounded window of lines around the cursor caps payload
//! size and latency. It is not a diff.

use crate::envelope::{Envelope, Turn};
use crate::prompts;

/// Default lines included on each side of the cursor.
pub const WINDOW_RADIUS: usize = 150;

/// Extract the window of lines `[max(0, cursor - r), min(n, cursor + r))`
/// around `cursor_line`, clamped to document bounds.
///
/// Line splitting follows the document's `\n` separators; a trailing newline
/// therefore contributes a final empty line, matching editor line counts.
#[must_use]
pub fn build_editor_snapshot(full_text: &str, cursor_line: usize, radius: usize) -> String {
    let lines: Vec<&str> = full_text.split('\n').collect();
    let start = cursor_line.saturating_sub(radius).min(lines.len());
    let end = cursor_line.saturating_add(radius).min(lines.len());
    lines[start..end].join("\n")
}

/// Wrap accumulated terminal output with the fixed instructional prefix.
///
/// The output is passed through verbatim; only the prefix is added.
#[must_use]
pub fn build_terminal_snapshot(accumulated_output: &str) -> String {
    format!("{}\n\n{accumulated_output}", prompts::TERMINAL_PREFIX)
}

/// Build the full editor-snapshot envelope: system prompt, a seeded model
/// acknowledgement, then the windowed code.
#[must_use]
pub fn editor_snapshot_envelope(
    file_uri: &str,
    full_text: &str,
    cursor_line: usize,
    radius: usize,
) -> Envelope {
    let snippet = build_editor_snapshot(full_text, cursor_line, radius);
    Envelope::Generate {
        contents: vec![
            Turn::user(prompts::system_prompt(file_uri)),
            Turn::model("Understood. Send the code snippet."),
            Turn::user(snippet),
        ],
        generation_config: None,
    }
}

/// Build the terminal-snapshot envelope.
#[must_use]
pub fn terminal_snapshot_envelope(accumulated_output: &str) -> Envelope {
    Envelope::Generate {
        contents: vec![Turn::user(build_terminal_snapshot(accumulated_output))],
        generation_config: None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_doc(lines: usize) -> String {
        (0..lines).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n")
    }

    // ── build_editor_snapshot ────────────────────────────────────────

    #[test]
    fn small_document_returned_whole() {
        let doc = numbered_doc(10);
        assert_eq!(build_editor_snapshot(&doc, 5, WINDOW_RADIUS), doc);
    }

    #[test]
    fn window_clamps_at_start() {
        let doc = numbered_doc(400);
        let snap = build_editor_snapshot(&doc, 10, WINDOW_RADIUS);
        // start = max(0, 10-150) = 0, end = min(400, 160) = 160
        assert!(snap.starts_with("line 0"));
        assert!(snap.ends_with("line 159"));
        assert_eq!(snap.split('\n').count(), 160);
    }

    #[test]
    fn window_clamps_at_end() {
        let doc = numbered_doc(400);
        let snap = build_editor_snapshot(&doc, 395, WINDOW_RADIUS);
        // start = 245, end = min(400, 545) = 400
        assert!(snap.starts_with("line 245"));
        assert!(snap.ends_with("line 399"));
        assert_eq!(snap.split('\n').count(), 155);
    }

    #[test]
    fn window_centered_in_large_document() {
        let doc = numbered_doc(1000);
        let snap = build_editor_snapshot(&doc, 500, WINDOW_RADIUS);
        assert!(snap.starts_with("line 350"));
        assert!(snap.ends_with("line 649"));
        assert_eq!(snap.split('\n').count(), 300);
    }

    #[test]
    fn cursor_beyond_document_yields_empty() {
        let doc = numbered_doc(5);
        assert_eq!(build_editor_snapshot(&doc, 5000, WINDOW_RADIUS), "");
    }

    #[test]
    fn empty_document() {
        assert_eq!(build_editor_snapshot("", 0, WINDOW_RADIUS), "");
    }

    #[test]
    fn narrow_radius_shrinks_the_window() {
        let doc = numbered_doc(100);
        let snap = build_editor_snapshot(&doc, 50, 5);
        assert!(snap.starts_with("line 45"));
        assert!(snap.ends_with("line 54"));
        assert_eq!(snap.split('\n').count(), 10);
    }

    #[test]
    fn deterministic() {
        let doc = numbered_doc(500);
        assert_eq!(
            build_editor_snapshot(&doc, 123, WINDOW_RADIUS),
            build_editor_snapshot(&doc, 123, WINDOW_RADIUS)
        );
    }

    proptest::proptest! {
        #[test]
        fn window_never_exceeds_diameter(
            line_count in 0usize..600,
            cursor in 0usize..700,
        ) {
            let doc = numbered_doc(line_count);
            let snap = build_editor_snapshot(&doc, cursor, WINDOW_RADIUS);
            let produced = if snap.is_empty() { 0 } else { snap.split('\n').count() };
            proptest::prop_assert!(produced <= 2 * WINDOW_RADIUS);
            proptest::prop_assert!(produced <= line_count.max(1));
        }
    }

    // ── build_terminal_snapshot ──────────────────────────────────────

    #[test]
    fn terminal_snapshot_is_prefixed_verbatim() {
        let snap = build_terminal_snapshot("$ ls\nfoo bar\n");
        assert!(snap.starts_with(prompts::TERMINAL_PREFIX));
        assert!(snap.ends_with("$ ls\nfoo bar\n"));
    }

    // ── envelopes ────────────────────────────────────────────────────

    #[test]
    fn editor_envelope_carries_three_turns() {
        let env = editor_snapshot_envelope("file:///a.rs", "fn main() {}", 0, WINDOW_RADIUS);
        let wire = env.to_wire();
        let contents = wire["generateContentRequest"]["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "fn main() {}");
        let sys = contents[0]["parts"][0]["text"].as_str().unwrap();
        assert!(sys.contains("file:///a.rs"));
    }

    #[test]
    fn terminal_envelope_is_single_user_turn() {
        let env = terminal_snapshot_envelope("output");
        let wire = env.to_wire();
        let contents = wire["generateContentRequest"]["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
    }
}
