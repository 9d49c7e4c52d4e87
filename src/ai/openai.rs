// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::{format_for_log, AiError, CompletionProvider, PromptMessage};
use crate::config::AiConfig;
use crate::metrics;

/// Client for any OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    async fn request(&self, messages: &[PromptMessage]) -> Result<String, AiError> {
        let body = OpenAiRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let mut req = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);

        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(AiError::Api { status, message });
        }

        let data: OpenAiResponse = resp.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AiError> {
        debug!(
            "Completion request ({} messages, model {}):\n{}",
            messages.len(),
            self.model,
            format_for_log(messages)
        );

        match self.request(messages).await {
            Ok(content) => {
                metrics::AI_REQUESTS.with_label_values(&["ok"]).inc();
                Ok(content)
            }
            Err(e) => {
                metrics::AI_REQUESTS.with_label_values(&["error"]).inc();
                error!("Completion request failed (model {}): {}", self.model, e);
                Err(e)
            }
        }
    }
}
