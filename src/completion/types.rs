//! Chat-completions wire types
//!
//! Only the subset of the OpenAI-compatible schema that report generation
//! uses. Unknown response fields are ignored.

use crate::routing::EffectiveConfig;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Role the model is asked to play for every report
pub const SYSTEM_PROMPT: &str =
    "You are a consultant who analyses urban sites for the redevelopment of fuel station properties.";

/// Appended to the system prompt when a JSON response is forced
pub const JSON_INSTRUCTION: &str = "Respond with a single JSON object and nothing else.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage<'a> {
    pub role: Role,
    pub content: Cow<'a, str>,
}

/// `response_format` request field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl ResponseFormat {
    pub fn json_object() -> Self {
        Self {
            kind: "json_object",
        }
    }
}

/// Request body for `POST base_url`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

impl<'a> ChatCompletionRequest<'a> {
    /// Build the request for one report from the resolved configuration
    pub fn new(config: &'a EffectiveConfig, prompt_payload: &'a str) -> Self {
        let (system, response_format) = if config.force_json() {
            (
                Cow::Owned(format!("{} {}", SYSTEM_PROMPT, JSON_INSTRUCTION)),
                Some(ResponseFormat::json_object()),
            )
        } else {
            (Cow::Borrowed(SYSTEM_PROMPT), None)
        };

        Self {
            model: config.model(),
            messages: vec![
                ChatMessage {
                    role: Role::System,
                    content: system,
                },
                ChatMessage {
                    role: Role::User,
                    content: Cow::Borrowed(prompt_payload),
                },
            ],
            temperature: config.temperature(),
            response_format,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Trimmed text of the first choice, `None` if absent or blank
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
    }
}
