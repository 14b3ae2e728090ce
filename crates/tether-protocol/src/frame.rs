//! Inbound frames.
//!
//! The service streams JSON objects in two response shapes that must be
//! accepted interchangeably: the current `serverContent.modelTurn` shape and
//! the legacy `generateContentResponse.candidates` shape. Both decode to
//! [`Frame::ContentDelta`]; the upstream shape is not guaranteed stable, so
//! nothing above the decoder may depend on which one arrived.
//!
//! Malformed input yields a [`TetherError::Protocol`] — callers log and
//! swallow it rather than tearing down the socket, since partial frames are
//! expected during streaming.

use serde::Deserialize;
use tether_core::TetherError;

/// Finish reason string signalling normal completion.
pub const FINISH_STOP: &str = "STOP";

/// An inbound message, decoded from either wire shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// The service acknowledged the setup envelope.
    SetupAck,
    /// A streamed content fragment.
    ContentDelta {
        /// Role reported by the service, when present.
        role: Option<String>,
        /// Concatenated text of this fragment's parts, in part order.
        text: String,
        /// Finish reason, when this fragment ends a generation.
        finish_reason: Option<String>,
        /// Whether the model's turn is complete.
        turn_complete: bool,
        /// Whether generation is complete.
        generation_complete: bool,
    },
    /// An explicit error reported by the service.
    Error {
        /// Service-assigned error code.
        code: i64,
        /// Human-readable message.
        message: String,
    },
}

impl Frame {
    /// Whether this frame completes an in-flight one-shot request.
    #[must_use]
    pub fn is_final(&self) -> bool {
        match self {
            Self::ContentDelta {
                finish_reason,
                turn_complete,
                generation_complete,
                ..
            } => {
                *turn_complete
                    || *generation_complete
                    || finish_reason.as_deref() == Some(FINISH_STOP)
            }
            Self::SetupAck | Self::Error { .. } => false,
        }
    }
}

// ─── Raw wire shapes ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<RawServerContent>,
    generate_content_response: Option<RawGenerateResponse>,
    error: Option<RawError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServerContent {
    model_turn: Option<RawTurn>,
    #[serde(default)]
    turn_complete: bool,
    #[serde(default)]
    generation_complete: bool,
}

#[derive(Deserialize)]
struct RawTurn {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<RawPart>,
}

#[derive(Deserialize)]
struct RawPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGenerateResponse {
    #[serde(default)]
    candidates: Vec<RawCandidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCandidate {
    content: Option<RawTurn>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct RawError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

fn parts_text(turn: Option<&RawTurn>) -> String {
    turn.map(|t| {
        t.parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect::<String>()
    })
    .unwrap_or_default()
}

/// Decode one inbound wire message into a [`Frame`].
///
/// Accepts both response shapes. Precedence for ambiguous objects follows
/// the service's own semantics: an `error` member wins, then setup ack,
/// then either content shape.
pub fn decode_frame(text: &str) -> Result<Frame, TetherError> {
    let raw: RawFrame = serde_json::from_str(text)
        .map_err(|e| TetherError::Protocol(format!("unparseable frame: {e}")))?;

    if let Some(err) = raw.error {
        return Ok(Frame::Error {
            code: err.code,
            message: err.message,
        });
    }

    if raw.setup_complete.is_some() {
        return Ok(Frame::SetupAck);
    }

    if let Some(server_content) = raw.server_content {
        let text = parts_text(server_content.model_turn.as_ref());
        let role = server_content
            .model_turn
            .as_ref()
            .and_then(|t| t.role.clone());
        return Ok(Frame::ContentDelta {
            role,
            text,
            finish_reason: None,
            turn_complete: server_content.turn_complete,
            generation_complete: server_content.generation_complete,
        });
    }

    if let Some(response) = raw.generate_content_response {
        let Some(candidate) = response.candidates.into_iter().next() else {
            return Err(TetherError::Protocol(
                "generateContentResponse with no candidates".into(),
            ));
        };
        let text = parts_text(candidate.content.as_ref());
        let role = candidate.content.as_ref().and_then(|t| t.role.clone());
        return Ok(Frame::ContentDelta {
            role,
            text,
            finish_reason: candidate.finish_reason,
            turn_complete: false,
            generation_complete: false,
        });
    }

    Err(TetherError::Protocol("unrecognized frame shape".into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
