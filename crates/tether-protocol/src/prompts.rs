//! Prompt templates, response schemas, and structured-response payloads for
//! the one-shot assist commands.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::envelope::{Envelope, Turn};

/// Instructional prefix for terminal snapshots.
pub const TERMINAL_PREFIX: &str = "You are watching the output of the user's terminal. \
Point out failing commands, error messages, and likely fixes. \
Keep responses short and actionable.";

/// Build the system prompt for an editor snapshot of `file_uri`.
#[must_use]
pub fn system_prompt(file_uri: &str) -> String {
    format!(
        "You are an expert coding assistant integrated into an editor.\n\
         You are seeing a snapshot of the file '{file_uri}'.\n\
         Provide concise and relevant code suggestions or explanations based on the \
         user's current cursor position and the surrounding code.\n\
         Do not leak context between different files shown to you."
    )
}

// ─── Fix ─────────────────────────────────────────────────────────────────────

/// Response schema for the fix command.
#[must_use]
pub fn fix_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "fixedCode": { "type": "string", "description": "The fixed version of the code" },
            "explanation": { "type": "string", "description": "Brief explanation of the changes made" }
        },
        "required": ["fixedCode"]
    })
}

/// Build the fix-command envelope for `selected_text`.
#[must_use]
pub fn fix_envelope(selected_text: &str) -> Envelope {
    let prompt = format!(
        "Fix the following code and explain what was wrong. Return ONLY a JSON object \
         with 'fixedCode' and 'explanation' properties:\n\n{selected_text}"
    );
    Envelope::Generate {
        contents: vec![Turn::user(prompt)],
        generation_config: Some(json!({ "responseSchema": fix_schema() })),
    }
}

/// Parsed payload of a fix response.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FixPayload {
    /// The corrected code to apply in place of the selection.
    pub fixed_code: String,
    /// Optional summary of what changed.
    pub explanation: Option<String>,
}

// ─── Explain ─────────────────────────────────────────────────────────────────

/// Response schema for the explain command.
#[must_use]
pub fn explain_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "explanation": { "type": "string", "description": "Detailed explanation of how the code works" },
            "keyPoints": { "type": "array", "items": { "type": "string" }, "description": "Key points about the code" }
        },
        "required": ["explanation"]
    })
}

/// Build the explain-command envelope for `selected_text`.
#[must_use]
pub fn explain_envelope(selected_text: &str) -> Envelope {
    let prompt = format!(
        "Explain how the following code works. Return ONLY a JSON object with \
         'explanation' and 'keyPoints' properties:\n\n{selected_text}"
    );
    Envelope::Generate {
        contents: vec![Turn::user(prompt)],
        generation_config: Some(json!({ "responseSchema": explain_schema() })),
    }
}

/// Parsed payload of an explain response.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExplainPayload {
    /// The explanation text.
    pub explanation: String,
    /// Optional bullet points.
    pub key_points: Option<Vec<String>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
