// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use std::collections::HashMap;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::idgen::IdSource;
use crate::models::profile::is_valid_gender;
use crate::models::{ChatSession, Profile, UpdateChatSession};
use crate::store::ChatStore;

/// Creates a friend profile and a session with it in one transaction.
pub async fn create_chat_session(
    store: &dyn ChatStore,
    ids: &dyn IdSource,
    user_id: i64,
    friend: Profile,
) -> AppResult<ChatSession> {
    if !is_valid_gender(&friend.gender) {
        return Err(AppError::invalid(format!(
            "gender must be 'male' or 'female', got: {}",
            friend.gender
        )));
    }

    let now = Utc::now();
    let profile = Profile {
        id: ids.next_id(),
        user_id,
        created_at: now,
        updated_at: now,
        ..friend
    };
    let session = ChatSession {
        id: ids.next_id(),
        name: profile.name.clone(),
        user_id,
        profile_id: Some(profile.id),
        avatar: profile.avatar.clone(),
        created_at: now,
        updated_at: now,
    };

    let session = store.create_session(profile, session).await.map_err(|e| {
        error!("Failed to create chat session for user {}: {}", user_id, e);
        AppError::internal(e)
    })?;
    info!(user_id, session_id = session.id, "Created chat session");
    Ok(session)
}

/// Sessions of a user, newest first, with name and avatar taken from the
/// linked friend profiles.
pub async fn list_chat_sessions(
    store: &dyn ChatStore,
    user_id: i64,
) -> AppResult<Vec<ChatSession>> {
    let mut sessions = store.list_sessions(user_id).await?;

    let profile_ids: Vec<i64> = sessions.iter().filter_map(|s| s.profile_id).collect();
    let profiles: HashMap<i64, Profile> = store
        .get_profiles(user_id, &profile_ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    for session in &mut sessions {
        if let Some(profile) = session.profile_id.and_then(|id| profiles.get(&id)) {
            session.name = profile.name.clone();
            session.avatar = profile.avatar.clone();
        }
    }
    Ok(sessions)
}

/// Renames a session or changes its avatar; empty fields are ignored.
pub async fn update_chat_session(
    store: &dyn ChatStore,
    user_id: i64,
    session_id: i64,
    name: &str,
    avatar: &str,
) -> AppResult<ChatSession> {
    let changes = UpdateChatSession {
        name: Some(name.to_string()).filter(|s| !s.is_empty()),
        avatar: Some(avatar.to_string()).filter(|s| !s.is_empty()),
    };
    if changes.is_empty() {
        return Ok(store.get_session(user_id, session_id).await?);
    }
    Ok(store.update_session(user_id, session_id, changes).await?)
}

pub async fn delete_chat_session(
    store: &dyn ChatStore,
    user_id: i64,
    session_id: i64,
) -> AppResult<()> {
    store.delete_session(user_id, session_id).await?;
    info!(user_id, session_id, "Deleted chat session");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UpdateProfile;
    use crate::test_support::{MemoryStore, SequentialIds};

    fn friend(name: &str) -> Profile {
        Profile {
            name: name.into(),
            avatar: "a.png".into(),
            gender: "male".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_links_session_to_new_profile() {
        let store = MemoryStore::default();
        let ids = SequentialIds::starting_at(10);

        let session = create_chat_session(&store, &ids, 1, friend("Sam")).await.unwrap();
        assert_eq!(session.name, "Sam");
        let profile = store.get_profile(1, session.profile_id.unwrap()).await.unwrap();
        assert_eq!(profile.user_id, 1);
        assert_eq!(profile.gender, "male");
    }

    #[tokio::test]
    async fn rejects_unknown_gender() {
        let store = MemoryStore::default();
        let ids = SequentialIds::starting_at(10);
        let bad = Profile { gender: "robot".into(), ..Default::default() };
        let err = create_chat_session(&store, &ids, 1, bad).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn list_refreshes_from_profiles() {
        let store = MemoryStore::default();
        let ids = SequentialIds::starting_at(10);
        let older = create_chat_session(&store, &ids, 1, friend("Sam")).await.unwrap();
        let newer = create_chat_session(&store, &ids, 1, friend("Kim")).await.unwrap();
        create_chat_session(&store, &ids, 2, friend("Other")).await.unwrap();

        let rename = UpdateProfile { name: Some("Samuel".into()), ..Default::default() };
        store.update_profile(1, older.profile_id.unwrap(), rename).await.unwrap();

        let sessions = list_chat_sessions(&store, 1).await.unwrap();
        assert_eq!(sessions.iter().map(|s| s.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
        assert_eq!(sessions[1].name, "Samuel");
    }

    #[test_log::test(tokio::test)]
    async fn update_and_delete_are_scoped_to_owner() {
        let store = MemoryStore::default();
        let ids = SequentialIds::starting_at(10);
        let session = create_chat_session(&store, &ids, 1, friend("Sam")).await.unwrap();

        let err = update_chat_session(&store, 2, session.id, "Hijack", "").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let renamed = update_chat_session(&store, 1, session.id, "Boss", "").await.unwrap();
        assert_eq!(renamed.name, "Boss");
        assert_eq!(renamed.avatar, "a.png");

        let foreign = delete_chat_session(&store, 2, session.id).await;
        assert!(matches!(foreign, Err(AppError::NotFound(_))));
        delete_chat_session(&store, 1, session.id).await.unwrap();
        assert!(store.list_sessions(1).await.unwrap().is_empty());
    }
}
