// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::idgen::IdSource;
use crate::models::ids::{self, parse_id};
use crate::models::{ChatMessage, MessageRole, MessageType, UpdateChatMessage};
use crate::store::ChatStore;

/// Feedback tags a user can leave on a message; empty clears feedback
pub const ATTITUDES: [&str; 3] = ["up", "down", ""];

/// Stores new messages in `session_id` under fresh ids, all or none.
pub async fn create_messages(
    store: &dyn ChatStore,
    ids: &dyn IdSource,
    user_id: i64,
    session_id: i64,
    messages: Vec<ChatMessage>,
) -> AppResult<Vec<ChatMessage>> {
    if messages.is_empty() {
        return Ok(Vec::new());
    }
    store.get_session(user_id, session_id).await?;

    let now = Utc::now();
    let messages: Vec<ChatMessage> = messages
        .into_iter()
        .map(|message| ChatMessage {
            id: ids.next_id(),
            user_id,
            session_id,
            msg_at: if message.msg_at == DateTime::<Utc>::default() { now } else { message.msg_at },
            created_at: now,
            updated_at: now,
            ..message
        })
        .collect();

    store.insert_messages(messages.clone()).await?;
    info!(user_id, session_id, count = messages.len(), "Created messages");
    Ok(messages)
}

/// Partial update of one message; empty fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessagePatch {
    #[serde(with = "ids::id")]
    pub id: i64,
    pub content: String,
    pub role: String,
    pub msg_type: String,
    pub tags: Vec<String>,
}

impl MessagePatch {
    fn into_changes(self) -> AppResult<Option<(i64, UpdateChatMessage)>> {
        if self.id <= 0 {
            return Ok(None);
        }
        let role = match self.role.as_str() {
            "" => None,
            raw => Some(raw.parse::<MessageRole>().map_err(|e| AppError::invalid(e.to_string()))?),
        };
        let msg_type = match self.msg_type.as_str() {
            "" => None,
            raw => Some(raw.parse::<MessageType>().map_err(|e| AppError::invalid(e.to_string()))?),
        };
        let changes = UpdateChatMessage {
            content: Some(self.content).filter(|c| !c.is_empty()),
            role,
            msg_type,
            tags: Some(self.tags).filter(|t| !t.is_empty()),
        };
        Ok(Some((self.id, changes)))
    }
}

/// Applies every patch or none of them; patches without an id are skipped.
pub async fn update_messages(
    store: &dyn ChatStore,
    user_id: i64,
    patches: Vec<MessagePatch>,
) -> AppResult<Vec<ChatMessage>> {
    let mut changes = Vec::with_capacity(patches.len());
    for patch in patches {
        if let Some(change) = patch.into_changes()? {
            changes.push(change);
        }
    }
    if changes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(store.update_messages(user_id, changes).await?)
}

/// Hard-deletes messages of a session, returning how many were removed.
/// Unparsable ids are skipped.
pub async fn delete_messages(
    store: &dyn ChatStore,
    user_id: i64,
    session_id: i64,
    raw_ids: &[String],
) -> AppResult<usize> {
    let ids: Vec<i64> = raw_ids.iter().filter_map(|raw| parse_id(raw)).collect();
    if ids.is_empty() {
        return Ok(0);
    }
    let deleted = store.delete_messages(user_id, session_id, &ids).await?;
    info!(user_id, session_id, deleted, "Deleted messages");
    Ok(deleted)
}

/// Records a thumbs up or down on a message, replacing earlier feedback.
pub async fn feedback_message(
    store: &dyn ChatStore,
    user_id: i64,
    session_id: i64,
    message_id: i64,
    attitude: &str,
) -> AppResult<ChatMessage> {
    if !ATTITUDES.contains(&attitude) {
        return Err(AppError::invalid(format!("attitude must be one of: {:?}", ATTITUDES)));
    }

    let message = store.get_message(user_id, message_id).await?;
    if message.session_id != session_id {
        return Err(AppError::not_found(format!("message {message_id}")));
    }

    let mut tags: Vec<String> = message
        .tags
        .into_iter()
        .filter(|tag| !ATTITUDES.contains(&tag.as_str()))
        .collect();
    if !attitude.is_empty() {
        tags.push(attitude.to_string());
    }

    let changes = UpdateChatMessage { tags: Some(tags.clone()), ..Default::default() };
    let mut updated = store.update_messages(user_id, vec![(message_id, changes)]).await?;
    info!(user_id, message_id, attitude, ?tags, "Recorded message feedback");
    updated.pop().ok_or_else(|| AppError::not_found(format!("message {message_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatSession;
    use crate::store::MessageQuery;
    use crate::test_support::{MemoryStore, SequentialIds};

    async fn store_with_session() -> MemoryStore {
        let store = MemoryStore::default();
        store.put_session(ChatSession { id: 9, user_id: 1, ..Default::default() }).await;
        store
    }

    fn draft(content: &str) -> ChatMessage {
        ChatMessage { content: content.into(), role: MessageRole::Friend, ..Default::default() }
    }

    #[tokio::test]
    async fn created_messages_get_fresh_ids_and_owner() {
        let store = store_with_session().await;
        let ids = SequentialIds::starting_at(40);
        let spoofed = ChatMessage { id: 3, user_id: 99, session_id: 123, ..draft("hi") };

        let drafts = vec![spoofed, draft("there")];
        let created = create_messages(&store, &ids, 1, 9, drafts).await.unwrap();
        assert_eq!(created.iter().map(|m| m.id).collect::<Vec<_>>(), vec![40, 41]);
        assert!(created.iter().all(|m| m.user_id == 1 && m.session_id == 9));
        assert!(created[0].msg_at > DateTime::<Utc>::default());
    }

    #[tokio::test]
    async fn creating_in_a_foreign_session_fails() {
        let store = store_with_session().await;
        let ids = SequentialIds::starting_at(1);
        let err = create_messages(&store, &ids, 2, 9, vec![draft("x")]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_is_all_or_nothing() {
        let store = store_with_session().await;
        let ids = SequentialIds::starting_at(1);
        let drafts = vec![draft("a"), draft("b")];
        let created = create_messages(&store, &ids, 1, 9, drafts).await.unwrap();

        let patches = vec![
            MessagePatch { id: created[0].id, content: "edited".into(), ..Default::default() },
            MessagePatch { id: 777, content: "ghost".into(), ..Default::default() },
        ];
        let err = update_messages(&store, 1, patches).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let unchanged = store.get_message(1, created[0].id).await.unwrap();
        assert_eq!(unchanged.content, "a");

        let patches = vec![MessagePatch {
            id: created[1].id,
            role: "SELF".into(),
            tags: vec!["starred".into()],
            ..Default::default()
        }];
        let updated = update_messages(&store, 1, patches).await.unwrap();
        assert_eq!(updated[0].role, MessageRole::Myself);
        assert_eq!(updated[0].content, "b");
        assert_eq!(updated[0].tags, vec!["starred".to_string()]);
    }

    #[tokio::test]
    async fn bad_role_is_invalid() {
        let store = store_with_session().await;
        let patches = vec![MessagePatch { id: 1, role: "BOT".into(), ..Default::default() }];
        let result = update_messages(&store, 1, patches).await;
        assert!(matches!(result, Err(AppError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn delete_skips_garbage_ids() {
        let store = store_with_session().await;
        let ids = SequentialIds::starting_at(1);
        let drafts = vec![draft("a"), draft("b")];
        let created = create_messages(&store, &ids, 1, 9, drafts).await.unwrap();

        let raw = vec![created[0].id.to_string(), "nope".to_string(), "".to_string()];
        assert_eq!(delete_messages(&store, 1, 9, &raw).await.unwrap(), 1);
        assert_eq!(delete_messages(&store, 2, 9, &[created[1].id.to_string()]).await.unwrap(), 0);
        assert_eq!(store.list_messages(&MessageQuery::new(1, 9)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn feedback_replaces_previous_attitude() {
        let store = store_with_session().await;
        let ids = SequentialIds::starting_at(1);
        let mut reply = draft("try this");
        reply.tags = vec!["ai_reply".into(), "down".into()];
        let id = create_messages(&store, &ids, 1, 9, vec![reply]).await.unwrap()[0].id;

        let up = feedback_message(&store, 1, 9, id, "up").await.unwrap();
        assert_eq!(up.tags, vec!["ai_reply".to_string(), "up".to_string()]);

        let cleared = feedback_message(&store, 1, 9, id, "").await.unwrap();
        assert_eq!(cleared.tags, vec!["ai_reply".to_string()]);

        let unknown = feedback_message(&store, 1, 9, id, "meh").await;
        assert!(matches!(unknown, Err(AppError::InvalidArgument(_))));
        let missing = feedback_message(&store, 1, 9, 555, "up").await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
