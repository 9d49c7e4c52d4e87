// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use openai::OpenAiClient;

/// Role of one turn in a model transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: PromptRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: PromptRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: PromptRole::Assistant, content: content.into() }
    }
}

/// Renders a transcript for debug logs.
pub fn format_for_log(messages: &[PromptMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("[{:?}]: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text-generation backend used for consult replies and translations
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AiError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("empty completion response")]
    EmptyResponse,
}
