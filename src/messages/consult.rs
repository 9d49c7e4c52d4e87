// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::context::{build_prompt, system_prompt};
use crate::ai::format_for_log;
use crate::domain::appconfig::ConfigScope;
use crate::error::{AppError, AppResult};
use crate::models::chat_message::TAG_AI_REPLY;
use crate::models::{ChatMessage, ChatSession, MessageRole, MessageType, Profile};
use crate::state::AppState;
use crate::store::{ChatStore, MessageQuery};

#[derive(Debug, Clone, Default)]
pub struct ConsultRequest {
    pub session_id: i64,
    pub content: String,
    /// Newest AI reply to regenerate instead of asking a new question
    pub target_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsultReply {
    pub consult: ChatMessage,
    pub reply: ChatMessage,
}

/// The caller's root profile and the session's friend profile; either may
/// be missing.
pub(crate) async fn participants(
    store: &dyn ChatStore,
    user_id: i64,
    session: &ChatSession,
) -> AppResult<(Option<Profile>, Option<Profile>)> {
    let user = store.get_user(user_id).await?;

    let mut user_profile = None;
    if let Some(profile_id) = user.profile_id {
        match store.get_profile(user_id, profile_id).await {
            Ok(profile) => user_profile = Some(profile),
            Err(e) => warn!("User {} has no readable root profile: {}", user_id, e),
        }
    }

    let mut friend_profile = None;
    if let Some(profile_id) = session.profile_id {
        match store.get_profile(user_id, profile_id).await {
            Ok(profile) => friend_profile = Some(profile),
            Err(e) => warn!(
                "Friend profile {} of session {} not found: {}",
                profile_id, session.id, e
            ),
        }
    }
    Ok((user_profile, friend_profile))
}

/// Finds the user turn answered by `target_id`, which must be the session's
/// newest AI consult reply.
fn regeneration_parent(messages: &[ChatMessage], target_id: i64) -> AppResult<ChatMessage> {
    let last_reply = messages
        .iter()
        .rev()
        .find(|m| m.msg_type == MessageType::Consult && m.role == MessageRole::Ai);
    let target = match last_reply {
        Some(reply) if reply.id == target_id => reply,
        _ => return Err(AppError::invalid("target_id must be the last AI reply")),
    };
    target
        .parent_id
        .and_then(|parent_id| messages.iter().find(|m| m.id == parent_id))
        .cloned()
        .ok_or_else(|| AppError::invalid("target_id has no consult turn to answer"))
}

/// Asks the coach for a reply, or regenerates the newest one.
///
/// A new question is stored as a user CONSULT turn together with the reply.
/// Regeneration leaves the superseded reply in place and stores a new one
/// answering the same turn; listings then show only the newest.
pub async fn send_consult(
    state: &AppState,
    user_id: i64,
    request: &ConsultRequest,
    scope: &ConfigScope,
) -> AppResult<ConsultReply> {
    let store = state.store.as_ref();
    let session = store.get_session(user_id, request.session_id).await?;
    let (user_profile, friend_profile) = participants(store, user_id, &session).await?;

    let mut history = store.list_messages(&MessageQuery::new(user_id, session.id)).await?;
    history.reverse();

    let regenerate = request.target_id.filter(|id| *id > 0);
    let consult = match regenerate {
        Some(target_id) => {
            let consult = regeneration_parent(&history, target_id)?;
            history.retain(|m| m.id < target_id);
            consult
        }
        None => {
            if request.content.trim().is_empty() {
                return Err(AppError::invalid("content is required"));
            }
            let now = Utc::now();
            let consult = ChatMessage {
                id: state.ids.next_id(),
                user_id,
                session_id: session.id,
                role: MessageRole::User,
                msg_type: MessageType::Consult,
                content: request.content.clone(),
                msg_at: now,
                created_at: now,
                updated_at: now,
                ..Default::default()
            };
            history.push(consult.clone());
            consult
        }
    };

    let system = system_prompt(store, friend_profile.as_ref(), scope).await;
    let transcript =
        build_prompt(&system, user_profile.as_ref(), friend_profile.as_ref(), &history);

    let content = state.ai.complete(&transcript).await?;

    let now = Utc::now();
    let reply = ChatMessage {
        id: state.ids.next_id(),
        user_id,
        session_id: session.id,
        parent_id: Some(consult.id),
        role: MessageRole::Ai,
        msg_type: MessageType::Consult,
        content,
        tags: vec![TAG_AI_REPLY.to_string()],
        msg_at: now,
        created_at: now,
        updated_at: now,
        ..Default::default()
    };

    let mut rows = Vec::with_capacity(2);
    if regenerate.is_none() {
        rows.push(consult.clone());
    }
    rows.push(reply.clone());
    store.insert_messages(rows).await?;

    debug!("Consult transcript:\n{}\n[reply]: {}", format_for_log(&transcript), reply.content);
    info!(
        user_id,
        session_id = session.id,
        consult_id = consult.id,
        reply_id = reply.id,
        regenerated = regenerate.is_some(),
        "Consult reply stored"
    );

    Ok(ConsultReply { consult, reply })
}
