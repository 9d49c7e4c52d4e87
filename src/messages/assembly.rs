// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::MessageView;
use crate::domain::appconfig::{load_value, ConfigScope};
use crate::error::AppResult;
use crate::models::app_config::KEY_NEW_CHAT_GUIDE;
use crate::models::chat_message::TAG_DISABLE_INTERACT;
use crate::models::ids::parse_id;
use crate::models::{ChatMessage, MessageRole, MessageType};
use crate::store::{ChatStore, MessageQuery};

pub const DEFAULT_PAGE_SIZE: i64 = 1000;

/// Optional conjunctive filters of a listing
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub msg_type: Option<MessageType>,
    pub roles: Vec<MessageRole>,
    pub ids: Vec<i64>,
    pub parent_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    pub session_id: i64,
    pub filter: ListFilter,
    /// Smallest id already returned; empty for the first page
    pub page_token: String,
    pub page_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessagePage {
    pub messages: Vec<MessageView>,
    /// Set only when the page was full
    pub next_page_token: Option<String>,
}

/// Newest message of `msg_type` per parent id.
pub(crate) fn newest_by_parent(
    messages: &[ChatMessage],
    msg_type: MessageType,
) -> HashMap<i64, &ChatMessage> {
    let mut newest: HashMap<i64, &ChatMessage> = HashMap::new();
    for message in messages.iter().filter(|m| m.msg_type == msg_type) {
        let Some(parent_id) = message.parent_id else { continue };
        match newest.get(&parent_id) {
            Some(current) if current.id >= message.id => {}
            _ => {
                newest.insert(parent_id, message);
            }
        }
    }
    newest
}

/// Collapses a chronological page into its listed form.
///
/// Translations are attached to their parent instead of listed, and of
/// several consult replies to the same turn only the newest survives.
pub fn merge_page(messages: &[ChatMessage]) -> Vec<MessageView> {
    let translations = newest_by_parent(messages, MessageType::Translate);
    let consults = newest_by_parent(messages, MessageType::Consult);

    messages
        .iter()
        .filter(|m| m.msg_type != MessageType::Translate)
        .filter(|m| match (m.msg_type, m.parent_id) {
            (MessageType::Consult, Some(parent_id)) => {
                consults.get(&parent_id).map(|c| c.id) == Some(m.id)
            }
            _ => true,
        })
        .map(|m| MessageView {
            message: m.clone(),
            translate_content: translations.get(&m.id).map(|t| t.content.clone()),
        })
        .collect()
}

/// Read-only skeleton messages shown in a session that has none yet.
pub fn guide_messages(
    json: &str,
    user_id: i64,
    session_id: i64,
    now: DateTime<Utc>,
) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = match serde_json::from_str(json) {
        Ok(messages) => messages,
        Err(e) => {
            warn!("Invalid new chat guide template: {}", e);
            return Vec::new();
        }
    };
    // stored oldest first; flip into the newest-first order of a fetched page
    messages.reverse();
    for message in &mut messages {
        message.user_id = user_id;
        message.session_id = session_id;
        message.msg_at = now;
        message.tags.push(TAG_DISABLE_INTERACT.to_string());
    }
    messages
}

/// Lists one page of a session's messages, oldest first.
///
/// Pages are cut by descending id: `page_token` is the smallest id already
/// returned and the next token is only emitted for a full page.
pub async fn list_messages(
    store: &dyn ChatStore,
    user_id: i64,
    request: &ListRequest,
    scope: &ConfigScope,
) -> AppResult<MessagePage> {
    store.get_session(user_id, request.session_id).await?;

    let page_size = if request.page_size <= 0 { DEFAULT_PAGE_SIZE } else { request.page_size };
    let before_id = parse_id(&request.page_token);

    let query = MessageQuery {
        msg_type: request.filter.msg_type,
        roles: request.filter.roles.clone(),
        ids: request.filter.ids.clone(),
        parent_ids: request.filter.parent_ids.clone(),
        before_id,
        limit: Some(page_size),
        ..MessageQuery::new(user_id, request.session_id)
    };
    let mut page = store.list_messages(&query).await?;

    let mut next_page_token = None;
    if page.is_empty() && before_id.is_none() {
        if let Some(json) = load_value(store, KEY_NEW_CHAT_GUIDE, scope).await {
            page = guide_messages(&json, user_id, request.session_id, Utc::now());
            debug!(
                "Session {} is empty, showing {} guide messages",
                request.session_id,
                page.len()
            );
        }
    } else if page.len() as i64 == page_size {
        next_page_token = page.last().map(|m| m.id.to_string());
    }

    page.reverse();
    Ok(MessagePage { messages: merge_page(&page), next_page_token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AppConfig;
    use crate::models::ChatSession;
    use crate::test_support::MemoryStore;

    pub(crate) fn message(id: i64, msg_type: MessageType, parent_id: Option<i64>) -> ChatMessage {
        ChatMessage {
            id,
            user_id: 1,
            session_id: 9,
            parent_id,
            msg_type,
            content: format!("m{id}"),
            ..Default::default()
        }
    }

    async fn session_store() -> MemoryStore {
        let store = MemoryStore::default();
        store.put_session(ChatSession { id: 9, user_id: 1, ..Default::default() }).await;
        store
    }

    fn ids(page: &MessagePage) -> Vec<i64> {
        page.messages.iter().map(|v| v.message.id).collect()
    }

    #[test]
    fn translations_attach_to_their_parent() {
        let page = vec![
            message(1, MessageType::History, None),
            message(2, MessageType::Consult, None),
            message(3, MessageType::Translate, Some(2)),
        ];
        let merged = merge_page(&page);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].message.id, 1);
        assert_eq!(merged[0].translate_content, None);
        assert_eq!(merged[1].message.id, 2);
        assert_eq!(merged[1].translate_content.as_deref(), Some("m3"));
    }

    #[test]
    fn newest_translation_and_reply_win() {
        let page = vec![
            message(10, MessageType::Consult, None),
            message(11, MessageType::Consult, Some(10)),
            message(12, MessageType::Translate, Some(10)),
            message(13, MessageType::Consult, Some(10)),
            message(14, MessageType::Translate, Some(10)),
        ];
        let merged = merge_page(&page);
        let ids: Vec<i64> = merged.iter().map(|v| v.message.id).collect();
        assert_eq!(ids, vec![10, 13]);
        assert_eq!(merged[0].translate_content.as_deref(), Some("m14"));
    }

    #[tokio::test]
    async fn pages_walk_backwards_without_gaps() {
        let store = session_store().await;
        let rows = (1..=5).map(|id| message(id, MessageType::History, None)).collect();
        store.insert_messages(rows).await.unwrap();

        let scope = ConfigScope::default();
        let mut request = ListRequest { session_id: 9, page_size: 2, ..Default::default() };

        let first = list_messages(&store, 1, &request, &scope).await.unwrap();
        assert_eq!(ids(&first), vec![4, 5]);
        assert_eq!(first.next_page_token.as_deref(), Some("4"));

        request.page_token = first.next_page_token.unwrap();
        let second = list_messages(&store, 1, &request, &scope).await.unwrap();
        assert_eq!(ids(&second), vec![2, 3]);
        assert_eq!(second.next_page_token.as_deref(), Some("2"));

        request.page_token = second.next_page_token.unwrap();
        let last = list_messages(&store, 1, &request, &scope).await.unwrap();
        assert_eq!(ids(&last), vec![1]);
        assert_eq!(last.next_page_token, None);
    }

    #[tokio::test]
    async fn filters_narrow_the_page() {
        let store = session_store().await;
        let mut consult = message(3, MessageType::Consult, None);
        consult.role = MessageRole::Ai;
        store
            .insert_messages(vec![
                message(1, MessageType::History, None),
                message(2, MessageType::History, Some(1)),
                consult,
            ])
            .await
            .unwrap();

        let scope = ConfigScope::default();
        let by_type = ListRequest {
            session_id: 9,
            filter: ListFilter { msg_type: Some(MessageType::History), ..Default::default() },
            ..Default::default()
        };
        assert_eq!(ids(&list_messages(&store, 1, &by_type, &scope).await.unwrap()), vec![1, 2]);

        let by_parent = ListRequest {
            session_id: 9,
            filter: ListFilter { parent_ids: vec![1], ..Default::default() },
            ..Default::default()
        };
        assert_eq!(ids(&list_messages(&store, 1, &by_parent, &scope).await.unwrap()), vec![2]);

        let by_role = ListRequest {
            session_id: 9,
            filter: ListFilter { roles: vec![MessageRole::Ai], ..Default::default() },
            ..Default::default()
        };
        assert_eq!(ids(&list_messages(&store, 1, &by_role, &scope).await.unwrap()), vec![3]);
    }

    #[tokio::test]
    async fn empty_session_shows_the_guide() {
        let store = session_store().await;
        let guide = r#"[
            {"id": 1, "role": "AI", "msg_type": "CONSULT", "content": "Welcome"},
            {"id": 2, "role": "AI", "msg_type": "CONSULT", "content": "Paste a chat to begin",
             "tags": ["tip"]}
        ]"#;
        store
            .put_config(AppConfig {
                id: 1,
                key: KEY_NEW_CHAT_GUIDE.into(),
                value: guide.into(),
                ..Default::default()
            })
            .await;

        let request = ListRequest { session_id: 9, ..Default::default() };
        let page = list_messages(&store, 1, &request, &ConfigScope::default()).await.unwrap();
        assert_eq!(ids(&page), vec![1, 2]);
        assert_eq!(page.next_page_token, None);
        for view in &page.messages {
            assert_eq!(view.message.user_id, 1);
            assert_eq!(view.message.session_id, 9);
            assert!(view.message.has_tag(TAG_DISABLE_INTERACT));
        }
        let tags = &page.messages[1].message.tags;
        assert_eq!(tags, &vec!["tip".to_string(), TAG_DISABLE_INTERACT.to_string()]);
        assert_eq!(page.messages[0].message.msg_at, page.messages[1].message.msg_at);

        // nothing was persisted
        assert!(store.list_messages(&MessageQuery::new(1, 9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_session_without_guide_is_empty() {
        let store = session_store().await;
        let request = ListRequest { session_id: 9, ..Default::default() };
        let page = list_messages(&store, 1, &request, &ConfigScope::default()).await.unwrap();
        assert!(page.messages.is_empty());
    }

    #[tokio::test]
    async fn foreign_session_is_not_found() {
        let store = session_store().await;
        let request = ListRequest { session_id: 9, ..Default::default() };
        let err = list_messages(&store, 2, &request, &ConfigScope::default()).await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::NotFound(_)));
    }
}
