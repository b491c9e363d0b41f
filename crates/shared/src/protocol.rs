//! Wire shapes exchanged with the remote generation and ledger
//! collaborators.

use serde::{Deserialize, Serialize};

use crate::domain::{GenerateOptions, Language, MessageInput, TextStyle, Tone};

/// Flattened request body for the generation collaborator.
///
/// The collaborator contract takes raw text (or empty) plus an optional
/// image payload; [`GenerateRequest::from_input`] is the only place the
/// tagged input variant is flattened into that shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_b64: Option<String>,
    pub tone: Tone,
    pub language: Language,
    pub use_emojis: bool,
    pub text_style: TextStyle,
}

impl GenerateRequest {
    pub fn from_input(input: &MessageInput, options: GenerateOptions) -> Self {
        let (text, image_b64) = match input {
            MessageInput::Text(text) => (text.clone(), None),
            MessageInput::Screenshot(image_b64) => (String::new(), Some(image_b64.clone())),
        };

        Self {
            text,
            image_b64,
            tone: options.tone,
            language: options.language,
            use_emojis: options.use_emojis,
            text_style: options.text_style,
        }
    }
}

/// Context payload for the ghosting-recovery feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GhostingRequest {
    pub last_message: String,
    pub days_since_reply: u32,
    pub language: Language,
}

/// Identifies an account on the remote ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRequest {
    pub email: String,
}

impl AccountRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}
