//! Remote image description: credential handling, prompts and chat history.

mod anthropic;

pub use anthropic::{AnthropicDescriber, DescribeSettings};

use image::DynamicImage;
use thiserror::Error;

pub const DEFAULT_PROMPT: &str =
    "What can you see in this screenshot? Please describe its content.";

#[derive(Debug, Error)]
pub enum DescribeError {
    #[error("Please configure API key first")]
    MissingCredential,
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("request failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },
    #[error("analysis cancelled")]
    Cancelled,
}

pub type DescribeResult<T> = std::result::Result<T, DescribeError>;

/// A vision-capable chat backend that turns an image and a prompt into text.
pub trait Describer {
    fn describe(&self, image: &DynamicImage, prompt: &str) -> DescribeResult<String>;
}

/// Returns the user prompt, or [`DEFAULT_PROMPT`] when it is absent or blank.
pub fn resolve_prompt(prompt: Option<&str>) -> &str {
    match prompt.map(str::trim) {
        Some(prompt) if !prompt.is_empty() => prompt,
        _ => DEFAULT_PROMPT,
    }
}

/// API credential. Only checked for being non-empty; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(value: impl AsRef<str>) -> Option<Self> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<{} chars>)", self.0.chars().count())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "You",
            Self::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Default, Clone)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn record_exchange(&mut self, prompt: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: prompt.into(),
        });
        self.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: reply.into(),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prompt_falls_back_to_default() {
        assert_eq!(resolve_prompt(None), DEFAULT_PROMPT);
        assert_eq!(resolve_prompt(Some("")), DEFAULT_PROMPT);
        assert_eq!(resolve_prompt(Some("   ")), DEFAULT_PROMPT);
        assert_eq!(resolve_prompt(Some(" what app is this? ")), "what app is this?");
    }

    #[test]
    fn api_key_requires_non_empty_value() {
        assert!(ApiKey::new("").is_none());
        assert!(ApiKey::new(" \n").is_none());
        assert_eq!(
            ApiKey::new(" sk-ant-123 ").map(|key| key.expose().to_string()),
            Some("sk-ant-123".to_string())
        );
    }

    #[test]
    fn api_key_debug_hides_secret() {
        let key = ApiKey::new("sk-ant-secret").unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains("secret"));
        assert_eq!(rendered, "ApiKey(<13 chars>)");
    }

    #[test]
    fn missing_credential_message_matches_ui_copy() {
        assert_eq!(
            DescribeError::MissingCredential.to_string(),
            "Please configure API key first"
        );
    }

    #[test]
    fn chat_history_records_turns_in_order() {
        let mut history = ChatHistory::default();
        assert!(history.is_empty());

        history.record_exchange("describe", "a terminal window");
        history.record_exchange("and now?", "a browser");

        let roles: Vec<ChatRole> = history.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                ChatRole::User,
                ChatRole::Assistant,
                ChatRole::User,
                ChatRole::Assistant
            ]
        );
        assert_eq!(history.messages()[3].content, "a browser");
    }
}
