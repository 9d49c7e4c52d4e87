// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

//! Folds a session's message log into a model transcript.

use std::collections::HashMap;

use super::assembly::newest_by_parent;
use crate::ai::PromptMessage;
use crate::domain::appconfig::{load_value, ConfigScope};
use crate::models::app_config::KEY_CONSULT_PROMPT;
use crate::models::{ChatMessage, MessageRole, MessageType, Profile};
use crate::store::ChatStore;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a professional workplace communication coach. \
Help the user understand messages from their manager or colleagues and answer them well. \
Base your advice on the conversation so far, and keep replies short, clear and tactful.";

const PARTICIPANTS_HEADER: &str = "Conversation participants:\n";
const CHAT_LOG_HEADER: &str = "Chat log:\n";

/// Picks the system instruction: the friend's persona prompt, then the
/// configured default, then the built-in one.
pub async fn system_prompt(
    store: &dyn ChatStore,
    friend: Option<&Profile>,
    scope: &ConfigScope,
) -> String {
    if let Some(prompt) = friend.map(|f| f.prompt.as_str()).filter(|p| !p.is_empty()) {
        return prompt.to_string();
    }
    match load_value(store, KEY_CONSULT_PROMPT, scope).await {
        Some(prompt) if !prompt.is_empty() => prompt,
        _ => DEFAULT_SYSTEM_PROMPT.to_string(),
    }
}

/// Display name of the friend in prompt text.
pub fn friend_label(friend: Option<&Profile>) -> &str {
    friend.map(|f| f.name.as_str()).filter(|n| !n.is_empty()).unwrap_or("Friend")
}

/// Descriptive block about both participants, if either has attributes.
pub fn participants_block(user: Option<&Profile>, friend: Option<&Profile>) -> Option<String> {
    let user_block = user.and_then(|p| p.describe("User"));
    let friend_block = friend.and_then(|p| p.describe(friend_label(friend)));
    if user_block.is_none() && friend_block.is_none() {
        return None;
    }
    let mut block = String::from(PARTICIPANTS_HEADER);
    block.extend(user_block);
    block.extend(friend_block);
    Some(block)
}

/// Splits translations out of `messages`, keeping the newest per parent.
pub fn split_translations(
    messages: &[ChatMessage],
) -> (Vec<&ChatMessage>, HashMap<i64, &ChatMessage>) {
    let translations = newest_by_parent(messages, MessageType::Translate);
    let rest = messages.iter().filter(|m| m.msg_type != MessageType::Translate).collect();
    (rest, translations)
}

/// Transcript lines of the HISTORY messages, each followed by its attached
/// translation.
pub fn history_lines(messages: &[ChatMessage]) -> Vec<String> {
    let (rest, translations) = split_translations(messages);
    let mut lines = Vec::new();
    for message in rest.into_iter().filter(|m| m.msg_type == MessageType::History) {
        lines.push(message.history_line());
        if let Some(translation) = translations.get(&message.id) {
            lines.push(translation.history_line());
        }
    }
    lines
}

fn flush_history(batch: &mut Vec<String>, transcript: &mut Vec<PromptMessage>) {
    if !batch.is_empty() {
        transcript.push(PromptMessage::user(format!("{CHAT_LOG_HEADER}{}", batch.join("\n"))));
        batch.clear();
    }
}

/// Builds the consult transcript from a chronological message log.
///
/// Runs of HISTORY messages become one chat-log turn; every CONSULT message
/// is its own turn, spoken by the assistant when the AI wrote it.
pub fn build_prompt(
    system_prompt: &str,
    user: Option<&Profile>,
    friend: Option<&Profile>,
    messages: &[ChatMessage],
) -> Vec<PromptMessage> {
    let mut transcript = vec![PromptMessage::system(system_prompt)];
    if let Some(block) = participants_block(user, friend) {
        transcript.push(PromptMessage::user(block));
    }

    let (rest, translations) = split_translations(messages);
    let mut batch = Vec::new();
    for message in rest {
        match message.msg_type {
            MessageType::History => {
                batch.push(message.history_line());
                if let Some(translation) = translations.get(&message.id) {
                    batch.push(translation.history_line());
                }
            }
            MessageType::Consult => {
                flush_history(&mut batch, &mut transcript);
                transcript.push(match message.role {
                    MessageRole::Ai => PromptMessage::assistant(&message.content),
                    _ => PromptMessage::user(&message.content),
                });
            }
            MessageType::Translate => {}
        }
    }
    flush_history(&mut batch, &mut transcript);
    transcript
}
