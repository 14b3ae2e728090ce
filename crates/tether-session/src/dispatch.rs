//! Host-event dispatcher.
//!
//! Bridges editor happenings to session traffic: document changes are
//! debounced into context snapshots (trailing edge, latest-wins), terminal
//! output is forwarded as a terminal snapshot, and the fix/explain commands
//! run as one-shot structured requests whose results go back to the host.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use tether_core::{Result, TetherError};
use tether_protocol::prompts::{explain_envelope, fix_envelope, ExplainPayload, FixPayload};
use tether_protocol::snapshot::{editor_snapshot_envelope, terminal_snapshot_envelope};
use tether_settings::DispatchSettings;

use crate::host::{EditorHost, HostEvent, Range};
use crate::session::SessionHandle;

/// Latest pending document snapshot, waiting out the debounce window.
struct PendingSnapshot {
    uri: String,
    text: String,
    cursor_line: usize,
    cursor_character: usize,
}

async fn flush_snapshot(session: &SessionHandle, snapshot: PendingSnapshot, radius: usize) {
    let envelope =
        editor_snapshot_envelope(&snapshot.uri, &snapshot.text, snapshot.cursor_line, radius);
    if let Err(e) = session
        .send_anchored_snapshot(envelope, snapshot.cursor_line, snapshot.cursor_character)
        .await
    {
        debug!(error = %e, "editor snapshot dropped");
    }
}

/// Run the dispatcher until cancelled or the event channel closes.
///
/// One dispatcher runs per session; fix/explain requests are spawned so a
/// slow response never stalls snapshot flow. Document changes and cursor
/// moves share one debounce slot, latest-wins; saves flush immediately.
pub async fn run_dispatcher(
    session: SessionHandle,
    host: Arc<dyn EditorHost>,
    mut events: mpsc::Receiver<HostEvent>,
    settings: DispatchSettings,
    cancel: CancellationToken,
) {
    let debounce = Duration::from_millis(settings.debounce_ms);
    let mut pending: Option<PendingSnapshot> = None;
    // Flush deadline for the pending snapshot. Only document changes and
    // cursor moves push it out; unrelated events must not starve the flush.
    let mut deadline: Option<time::Instant> = None;
    let mut terminal_output = String::new();
    let mut monitoring = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    HostEvent::StartSession => {
                        if let Err(e) = session.start().await {
                            host.show_error(&format!("Could not start session: {e}"));
                        }
                    }
                    HostEvent::StopSession => {
                        session.stop().await;
                        host.show_info("Session stopped.");
                    }
                    HostEvent::DocumentChanged { uri, text, cursor_line, cursor_character }
                    | HostEvent::SelectionChanged { uri, text, cursor_line, cursor_character } => {
                        // Latest-wins: a newer change supersedes the waiting one.
                        pending = Some(PendingSnapshot { uri, text, cursor_line, cursor_character });
                        deadline = Some(time::Instant::now() + debounce);
                    }
                    HostEvent::DocumentSaved { uri, text, cursor_line, cursor_character } => {
                        pending = None;
                        deadline = None;
                        flush_snapshot(
                            &session,
                            PendingSnapshot { uri, text, cursor_line, cursor_character },
                            settings.window_radius,
                        ).await;
                    }
                    HostEvent::TerminalOpened => terminal_output.clear(),
                    HostEvent::TerminalMonitor(enabled) => monitoring = enabled,
                    HostEvent::TerminalData { text } => {
                        terminal_output.push_str(&text);
                        if monitoring {
                            let envelope = terminal_snapshot_envelope(&terminal_output);
                            if let Err(e) = session.send_snapshot(envelope).await {
                                debug!(error = %e, "terminal snapshot dropped");
                            }
                        }
                    }
                    HostEvent::FixSelection { uri, range, text } => {
                        spawn_fix(session.clone(), Arc::clone(&host), uri, range, text);
                    }
                    HostEvent::ExplainSelection { text } => {
                        spawn_explain(session.clone(), Arc::clone(&host), text);
                    }
                }
            }
            () = time::sleep_until(deadline.unwrap_or_else(time::Instant::now)),
                if deadline.is_some() =>
            {
                deadline = None;
                if let Some(snapshot) = pending.take() {
                    flush_snapshot(&session, snapshot, settings.window_radius).await;
                }
            }
            () = cancel.cancelled() => break,
        }
    }
}

fn spawn_fix(
    session: SessionHandle,
    host: Arc<dyn EditorHost>,
    uri: String,
    range: Range,
    text: String,
) {
    drop(tokio::spawn(async move {
        match request_structured::<FixPayload>(&session, fix_envelope(&text)).await {
            Ok(payload) => {
                if host.apply_edit(&uri, &range, &payload.fixed_code) {
                    let message = payload
                        .explanation
                        .unwrap_or_else(|| "Applied fix.".to_string());
                    host.show_info(&message);
                } else {
                    host.show_error("Could not apply the fix to the document.");
                }
            }
            Err(e) => {
                warn!(error = %e, "fix request failed");
                host.show_error(&format!("Fix failed: {e}"));
            }
        }
    }));
}

fn spawn_explain(session: SessionHandle, host: Arc<dyn EditorHost>, text: String) {
    drop(tokio::spawn(async move {
        match request_structured::<ExplainPayload>(&session, explain_envelope(&text)).await {
            Ok(payload) => {
                host.show_panel("Code Explanation", &render_explanation(&payload));
            }
            Err(e) => {
                warn!(error = %e, "explain request failed");
                host.show_error(&format!("Explain failed: {e}"));
            }
        }
    }));
}

async fn request_structured<T: DeserializeOwned>(
    session: &SessionHandle,
    envelope: tether_protocol::Envelope,
) -> Result<T> {
    let response = session.request(envelope).await?;
    parse_structured(&response)
}

/// Parse a structured JSON payload out of response text.
///
/// The service is asked for bare JSON but sometimes wraps it in prose or a
/// code fence; fall back to the outermost brace pair before giving up.
fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    if let Ok(payload) = serde_json::from_str(text) {
        return Ok(payload);
    }
    let start = text.find('{');
    let end = text.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(payload) = serde_json::from_str(&text[start..=end]) {
                return Ok(payload);
            }
        }
    }
    Err(TetherError::Protocol(format!(
        "response is not the expected JSON shape: {}",
        text.chars().take(120).collect::<String>()
    )))
}

/// Render an explanation payload as markdown for the host panel.
fn render_explanation(payload: &ExplainPayload) -> String {
    let mut markdown = format!("## Explanation\n\n{}\n", payload.explanation);
    if let Some(points) = &payload.key_points {
        if !points.is_empty() {
            markdown.push_str("\n### Key points\n\n");
            for point in points {
                markdown.push_str(&format!("- {point}\n"));
            }
        }
    }
    markdown
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── structured parsing ───────────────────────────────────────────

    #[test]
    fn parses_bare_json() {
        let payload: FixPayload =
            parse_structured(r#"{"fixedCode":"let x = 1;"}"#).unwrap();
        assert_eq!(payload.fixed_code, "let x = 1;");
    }

    #[test]
    fn parses_json_wrapped_in_prose() {
        let text = "Here is the fix:\n```json\n{\"fixedCode\":\"ok\",\"explanation\":\"done\"}\n```";
        let payload: FixPayload = parse_structured(text).unwrap();
        assert_eq!(payload.fixed_code, "ok");
        assert_eq!(payload.explanation.as_deref(), Some("done"));
    }

    #[test]
    fn rejects_non_json_response() {
        let err = parse_structured::<FixPayload>("sorry, I cannot help").unwrap_err();
        assert!(matches!(err, TetherError::Protocol(_)));
    }

    #[test]
    fn rejects_wrong_shape() {
        let err = parse_structured::<FixPayload>(r#"{"explanation":"no code"}"#).unwrap_err();
        assert!(matches!(err, TetherError::Protocol(_)));
    }

    // ── markdown rendering ───────────────────────────────────────────

    #[test]
    fn renders_explanation_with_key_points() {
        let markdown = render_explanation(&ExplainPayload {
            explanation: "Adds two numbers.".into(),
            key_points: Some(vec!["pure function".into(), "may overflow".into()]),
        });
        assert!(markdown.contains("## Explanation"));
        assert!(markdown.contains("Adds two numbers."));
        assert!(markdown.contains("- pure function"));
        assert!(markdown.contains("- may overflow"));
    }

    #[test]
    fn renders_explanation_without_key_points() {
        let markdown = render_explanation(&ExplainPayload {
            explanation: "Just a loop.".into(),
            key_points: None,
        });
        assert!(!markdown.contains("### Key points"));
    }

    // ── debounce ─────────────────────────────────────────────────────

    #[derive(Default)]
    struct RecordingHost {
        infos: parking_lot::Mutex<Vec<String>>,
        errors: parking_lot::Mutex<Vec<String>>,
    }

    impl EditorHost for RecordingHost {
        fn show_info(&self, message: &str) {
            self.infos.lock().push(message.into());
        }
        fn show_error(&self, message: &str) {
            self.errors.lock().push(message.into());
        }
        fn apply_edit(&self, _uri: &str, _range: &Range, _new_text: &str) -> bool {
            true
        }
        fn show_panel(&self, _title: &str, _markdown: &str) {}
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_collapse_to_one_snapshot_attempt() {
        // The session is never started, so the snapshot send fails with
        // NotConnected; what matters here is that the dispatcher survives
        // and the debounce window collapses a burst into a single flush.
        let mut settings = tether_settings::TetherSettings::default();
        settings.service.endpoint = "ws://127.0.0.1:1".into();
        let session = SessionHandle::spawn(settings, "k");
        let host: Arc<dyn EditorHost> = Arc::new(RecordingHost::default());
        let (event_tx, event_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let dispatcher = tokio::spawn(run_dispatcher(
            session.clone(),
            host,
            event_rx,
            DispatchSettings::default(),
            cancel.clone(),
        ));

        for i in 0..5 {
            event_tx
                .send(HostEvent::DocumentChanged {
                    uri: "file:///main.rs".into(),
                    text: format!("fn main() {{}} // v{i}"),
                    cursor_line: 0,
                    cursor_character: 0,
                })
                .await
                .unwrap();
            time::sleep(Duration::from_millis(50)).await;
        }
        // Past the debounce window now.
        time::sleep(Duration::from_millis(400)).await;

        cancel.cancel();
        dispatcher.await.unwrap();
        session.stop().await;
    }
}
