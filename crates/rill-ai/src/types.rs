//! Core types for chat-completion requests

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Lowest accepted sampling temperature
pub const MIN_TEMPERATURE: f32 = 0.0;
/// Highest accepted sampling temperature
pub const MAX_TEMPERATURE: f32 = 2.0;
/// Temperature used when none is configured
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Get the role as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `{role, content}` entry sent upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Everything needed to issue one streaming request.
///
/// Immutable once built; the gateway only ever borrows it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestConfig {
    #[serde(rename = "model")]
    model_id: String,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

impl RequestConfig {
    /// Build a request, rejecting an empty model id or an out-of-range temperature
    pub fn new(
        model_id: impl Into<String>,
        temperature: f32,
        messages: Vec<ChatMessage>,
    ) -> Result<Self> {
        let model_id = model_id.into();
        if model_id.trim().is_empty() {
            return Err(Error::Configuration("model id is empty".to_string()));
        }
        validate_temperature(temperature)?;
        Ok(Self {
            model_id,
            temperature,
            messages,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

/// Check that a temperature lies within the accepted range
pub fn validate_temperature(temperature: f32) -> Result<()> {
    if !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature) {
        return Err(Error::Configuration(format!(
            "temperature {} is outside {}..={}",
            temperature, MIN_TEMPERATURE, MAX_TEMPERATURE
        )));
    }
    Ok(())
}
