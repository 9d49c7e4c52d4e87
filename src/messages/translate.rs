// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::info;

use super::consult::participants;
use super::context::{friend_label, history_lines};
use crate::ai::PromptMessage;
use crate::domain::appconfig::{load_value, ConfigScope};
use crate::error::{AppError, AppResult};
use crate::models::app_config::{KEY_TRANSLATE_TO_FRIEND, KEY_TRANSLATE_TO_USER};
use crate::models::chat_message::{TAG_TO_FRIEND, TAG_TO_USER};
use crate::models::{ids, ChatMessage, MessageRole, MessageType, Profile};
use crate::state::AppState;
use crate::store::MessageQuery;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    #[serde(with = "ids::id")]
    pub message_id: i64,
    pub content: String,
}

fn profile_text(profile: Option<&Profile>, who: &str) -> String {
    profile.and_then(|p| p.describe(who)).unwrap_or_default()
}

/// Reinterprets one message for the other party and stores the result as a
/// TRANSLATE message attached to it.
///
/// The prompt template depends on who wrote the message; the conversation
/// within a day either side of it is given as context.
pub async fn translate_message(
    state: &AppState,
    user_id: i64,
    session_id: i64,
    message_id: i64,
    scope: &ConfigScope,
) -> AppResult<Translation> {
    let store = state.store.as_ref();
    let target = store.get_message(user_id, message_id).await?;
    if target.session_id != session_id {
        return Err(AppError::not_found(format!("message {message_id}")));
    }
    let session = store.get_session(user_id, session_id).await?;

    let (key, direction) = match target.role {
        MessageRole::Myself | MessageRole::User => (KEY_TRANSLATE_TO_FRIEND, TAG_TO_FRIEND),
        MessageRole::Friend => (KEY_TRANSLATE_TO_USER, TAG_TO_USER),
        other => {
            return Err(AppError::invalid(format!("cannot translate a message from role {other}")))
        }
    };
    let template = load_value(store, key, scope)
        .await
        .ok_or_else(|| AppError::not_found(format!("config {key}")))?;

    let (user_profile, friend_profile) = participants(store, user_id, &session).await?;

    let window = Duration::hours(24);
    let query = MessageQuery {
        from_id: Some(state.ids.id_at(target.created_at - window)),
        before_id: Some(state.ids.id_at(target.created_at + window)),
        ..MessageQuery::new(user_id, session_id)
    };
    let mut nearby = store.list_messages(&query).await?;
    nearby.reverse();
    let chat_context: String =
        history_lines(&nearby).into_iter().map(|line| line + "\n").collect();

    let prompt = template
        .replace("{{user_profile}}", &profile_text(user_profile.as_ref(), "User"))
        .replace(
            "{{friend_profile}}",
            &profile_text(friend_profile.as_ref(), friend_label(friend_profile.as_ref())),
        )
        .replace("{{chat_context}}", &chat_context)
        .replace("{{src_message}}", &target.history_line());

    let content = state.ai.complete(&[PromptMessage::user(prompt)]).await?;

    let now = Utc::now();
    let translation = ChatMessage {
        id: state.ids.next_id(),
        user_id,
        session_id,
        parent_id: Some(target.id),
        role: MessageRole::Ai,
        msg_type: MessageType::Translate,
        content: content.clone(),
        tags: vec![direction.to_string()],
        msg_at: now,
        created_at: now,
        updated_at: now,
        ..Default::default()
    };
    let message_id = translation.id;
    store.insert_messages(vec![translation]).await?;

    info!(user_id, source_id = target.id, translation_id = message_id, "Translated message");
    Ok(Translation { message_id, content })
}
