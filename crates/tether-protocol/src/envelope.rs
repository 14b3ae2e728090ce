//! Outbound envelopes.
//!
//! Every message the session sends is an [`Envelope`]. The first envelope
//! after a socket opens must be [`Envelope::Setup`]; content flows as
//! [`Envelope::ContentTurn`] (current shape) or [`Envelope::Generate`]
//! (legacy shape, which the service still expects for one-shot structured
//! requests). [`Envelope::KeepAlive`] is the application-level liveness
//! signal for deployments that cannot use protocol pings.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// One text part of a turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    /// Part text.
    pub text: String,
}

impl ContentPart {
    /// Convenience constructor.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One conversation turn (role + parts).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// `"user"` or `"model"`.
    pub role: String,
    /// Ordered text parts.
    pub parts: Vec<ContentPart>,
}

impl Turn {
    /// A single-part user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            parts: vec![ContentPart::text(text)],
        }
    }

    /// A single-part model turn (used to seed conversational context).
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: "model".into(),
            parts: vec![ContentPart::text(text)],
        }
    }
}

/// Generation setup options sent in the setup envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Requested response modalities, e.g. `["TEXT"]`.
    pub response_modalities: Vec<String>,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            response_modalities: vec!["TEXT".into()],
        }
    }
}

/// An outbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Envelope {
    /// Session setup; must be the first envelope on a fresh socket.
    Setup {
        /// Model identifier.
        model: String,
        /// Generation options.
        config: SetupConfig,
    },
    /// Incremental conversation content (current wire shape).
    ContentTurn {
        /// Turns to append.
        turns: Vec<Turn>,
        /// Whether the client's turn is complete.
        turn_complete: bool,
    },
    /// One-shot generation request (legacy wire shape). Carries an optional
    /// `generationConfig` such as a response schema.
    Generate {
        /// Full prompt contents.
        contents: Vec<Turn>,
        /// Optional raw `generationConfig` object.
        generation_config: Option<Value>,
    },
    /// Application-level keep-alive (an empty, incomplete client turn).
    KeepAlive,
}

impl Envelope {
    /// Serialize to the service's JSON wire shape.
    #[must_use]
    pub fn to_wire(&self) -> Value {
        match self {
            Self::Setup { model, config } => json!({
                "setup": {
                    "model": model,
                    "config": config,
                }
            }),
            Self::ContentTurn {
                turns,
                turn_complete,
            } => json!({
                "clientContent": {
                    "turns": turns,
                    "turnComplete": turn_complete,
                }
            }),
            Self::Generate {
                contents,
                generation_config,
            } => {
                let mut req = json!({ "contents": contents });
                if let Some(config) = generation_config {
                    req["generationConfig"] = config.clone();
                }
                json!({ "generateContentRequest": req })
            }
            Self::KeepAlive => json!({
                "clientContent": {
                    "turns": [],
                    "turnComplete": false,
                }
            }),
        }
    }

    /// Serialize to wire text.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.to_wire().to_string()
    }

    /// Whether this envelope is allowed before setup has been acknowledged.
    #[must_use]
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Setup { .. })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_wire_shape() {
        let env = Envelope::Setup {
            model: "models/streamer-001".into(),
            config: SetupConfig::default(),
        };
        let wire = env.to_wire();
        assert_eq!(wire["setup"]["model"], "models/streamer-001");
        assert_eq!(wire["setup"]["config"]["response_modalities"][0], "TEXT");
    }

    #[test]
    fn content_turn_wire_shape() {
        let env = Envelope::ContentTurn {
            turns: vec![Turn::user("hello")],
            turn_complete: true,
        };
        let wire = env.to_wire();
        assert_eq!(wire["clientContent"]["turns"][0]["role"], "user");
        assert_eq!(
            wire["clientContent"]["turns"][0]["parts"][0]["text"],
            "hello"
        );
        assert_eq!(wire["clientContent"]["turnComplete"], true);
    }

    #[test]
    fn generate_wire_shape_without_config() {
        let env = Envelope::Generate {
            contents: vec![Turn::user("fix this"), Turn::model("ok")],
            generation_config: None,
        };
        let wire = env.to_wire();
        let contents = wire["generateContentRequest"]["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[1]["role"], "model");
        assert!(wire["generateContentRequest"].get("generationConfig").is_none());
    }

    #[test]
    fn generate_wire_shape_with_schema() {
        let schema = serde_json::json!({"type": "object"});
        let env = Envelope::Generate {
            contents: vec![Turn::user("explain")],
            generation_config: Some(serde_json::json!({"responseSchema": schema})),
        };
        let wire = env.to_wire();
        assert_eq!(
            wire["generateContentRequest"]["generationConfig"]["responseSchema"]["type"],
            "object"
        );
    }

    #[test]
    fn keepalive_is_empty_incomplete_turn() {
        let wire = Envelope::KeepAlive.to_wire();
        assert_eq!(wire["clientContent"]["turns"].as_array().unwrap().len(), 0);
        assert_eq!(wire["clientContent"]["turnComplete"], false);
    }

    #[test]
    fn only_setup_is_setup() {
        assert!(Envelope::Setup {
            model: "m".into(),
            config: SetupConfig::default(),
        }
        .is_setup());
        assert!(!Envelope::KeepAlive.is_setup());
    }

    #[test]
    fn to_text_is_compact_json() {
        let text = Envelope::KeepAlive.to_text();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert!(parsed.get("clientContent").is_some());
    }
}
