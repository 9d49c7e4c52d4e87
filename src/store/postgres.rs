// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::OptionalExtension;
use diesel::sql_types::Text;
use diesel_async::pooled_connection::deadpool::Object;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use tracing::debug;

use super::{
    ChatStore, ConfigFilter, DemoRows, MessageQuery, ProfileQuery, StoreError, StoreResult,
};
use crate::db::DbPool;
use crate::models::chat_message::TAG_DEMO;
use crate::models::user_file::FILE_STATUS_NORMAL;
use crate::models::{
    AppConfig, ChatMessage, ChatSession, Profile, UpdateChatMessage, UpdateChatSession,
    UpdateProfile, User, UserFile,
};
use crate::schema::{chat_messages, chat_sessions, configs, profiles, user_files, users};

/// [`ChatStore`] backed by PostgreSQL through a deadpool connection pool
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<Object<AsyncPgConnection>> {
        self.pool.get().await.map_err(|e| StoreError::Pool(e.to_string()))
    }
}

fn not_found(what: &str, id: i64) -> StoreError {
    StoreError::NotFound(format!("{what} {id}"))
}

/// Finds a user by any of its identities while holding a transaction-scoped
/// advisory lock per identity.
async fn lock_and_find_user(
    conn: &mut AsyncPgConnection,
    user: &User,
) -> StoreResult<Option<User>> {
    for identity in user.identities() {
        diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind::<Text, _>(identity)
            .execute(conn)
            .await?;
    }

    let mut query = users::table.into_boxed();
    query = match (user.external_id(), user.phone()) {
        (Some(external_id), Some(phone)) => query.filter(
            users::external_id
                .eq(external_id.to_string())
                .or(users::phone.eq(phone.to_string())),
        ),
        (Some(external_id), None) => query.filter(users::external_id.eq(external_id.to_string())),
        (None, Some(phone)) => query.filter(users::phone.eq(phone.to_string())),
        (None, None) => return Ok(None),
    };

    Ok(query
        .order(users::id.asc())
        .select(User::as_select())
        .first(conn)
        .await
        .optional()?)
}

#[async_trait]
impl ChatStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::sql_query("SELECT 1").execute(&mut conn).await?;
        Ok(())
    }

    async fn find_or_create_user(&self, user: User, profile: Profile) -> StoreResult<(User, bool)> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                if let Some(existing) = lock_and_find_user(conn, &user).await? {
                    return Ok((existing, false));
                }

                diesel::insert_into(users::table)
                    .values(&user)
                    .execute(conn)
                    .await?;
                diesel::insert_into(profiles::table)
                    .values(&profile)
                    .execute(conn)
                    .await?;
                let created = diesel::update(users::table.find(user.id))
                    .set(users::profile_id.eq(Some(profile.id)))
                    .returning(User::as_returning())
                    .get_result(conn)
                    .await?;
                debug!("Inserted user {} with root profile {}", created.id, profile.id);
                Ok((created, true))
            }
            .scope_boxed()
        })
        .await
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        let mut conn = self.conn().await?;
        users::table
            .find(id)
            .select(User::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| not_found("user", id))
    }

    async fn get_profile(&self, user_id: i64, id: i64) -> StoreResult<Profile> {
        let mut conn = self.conn().await?;
        profiles::table
            .filter(profiles::id.eq(id))
            .filter(profiles::user_id.eq(user_id))
            .select(Profile::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| not_found("profile", id))
    }

    async fn get_profiles(&self, user_id: i64, ids: &[i64]) -> StoreResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        Ok(profiles::table
            .filter(profiles::user_id.eq(user_id))
            .filter(profiles::id.eq_any(ids))
            .select(Profile::as_select())
            .load(&mut conn)
            .await?)
    }

    async fn list_profiles(&self, query: &ProfileQuery) -> StoreResult<Vec<Profile>> {
        let mut conn = self.conn().await?;

        let mut q = profiles::table
            .filter(profiles::user_id.eq(query.user_id))
            .into_boxed();
        if !query.search.is_empty() {
            let pattern = format!("%{}%", query.search);
            q = q.filter(
                profiles::name
                    .like(pattern.clone())
                    .or(profiles::im_name.like(pattern)),
            );
        }
        if let Some(after_id) = query.after_id {
            q = q.filter(profiles::id.gt(after_id));
        }

        Ok(q.order(profiles::id.asc())
            .limit(query.limit)
            .select(Profile::as_select())
            .load(&mut conn)
            .await?)
    }

    async fn create_profile(&self, profile: Profile) -> StoreResult<Profile> {
        let mut conn = self.conn().await?;
        Ok(diesel::insert_into(profiles::table)
            .values(&profile)
            .returning(Profile::as_returning())
            .get_result(&mut conn)
            .await?)
    }

    async fn delete_profile(&self, user_id: i64, id: i64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let deleted = diesel::delete(
            profiles::table
                .filter(profiles::id.eq(id))
                .filter(profiles::user_id.eq(user_id)),
        )
        .execute(&mut conn)
        .await?;
        if deleted == 0 {
            return Err(not_found("profile", id));
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: i64,
        id: i64,
        changes: UpdateProfile,
    ) -> StoreResult<Profile> {
        let mut conn = self.conn().await?;
        diesel::update(
            profiles::table
                .filter(profiles::id.eq(id))
                .filter(profiles::user_id.eq(user_id)),
        )
        .set((&changes, profiles::updated_at.eq(Utc::now())))
        .returning(Profile::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| not_found("profile", id))
    }

    async fn get_user_file(&self, user_id: i64, id: i64) -> StoreResult<UserFile> {
        let mut conn = self.conn().await?;
        user_files::table
            .filter(user_files::id.eq(id))
            .filter(user_files::user_id.eq(user_id))
            .filter(user_files::status.eq(FILE_STATUS_NORMAL))
            .select(UserFile::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| not_found("file", id))
    }

    async fn set_file_usage(&self, id: i64, usage_type: &str) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        diesel::update(user_files::table.find(id))
            .set((
                user_files::usage_type.eq(usage_type),
                user_files::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn create_session(
        &self,
        profile: Profile,
        session: ChatSession,
    ) -> StoreResult<ChatSession> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                diesel::insert_into(profiles::table)
                    .values(&profile)
                    .execute(conn)
                    .await?;
                let created = diesel::insert_into(chat_sessions::table)
                    .values(&session)
                    .returning(ChatSession::as_returning())
                    .get_result(conn)
                    .await?;
                Ok(created)
            }
            .scope_boxed()
        })
        .await
    }

    async fn get_session(&self, user_id: i64, id: i64) -> StoreResult<ChatSession> {
        let mut conn = self.conn().await?;
        chat_sessions::table
            .filter(chat_sessions::id.eq(id))
            .filter(chat_sessions::user_id.eq(user_id))
            .select(ChatSession::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| not_found("chat session", id))
    }

    async fn list_sessions(&self, user_id: i64) -> StoreResult<Vec<ChatSession>> {
        let mut conn = self.conn().await?;
        Ok(chat_sessions::table
            .filter(chat_sessions::user_id.eq(user_id))
            .order(chat_sessions::id.desc())
            .select(ChatSession::as_select())
            .load(&mut conn)
            .await?)
    }

    async fn update_session(
        &self,
        user_id: i64,
        id: i64,
        changes: UpdateChatSession,
    ) -> StoreResult<ChatSession> {
        let mut conn = self.conn().await?;
        diesel::update(
            chat_sessions::table
                .filter(chat_sessions::id.eq(id))
                .filter(chat_sessions::user_id.eq(user_id)),
        )
        .set((&changes, chat_sessions::updated_at.eq(Utc::now())))
        .returning(ChatSession::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| not_found("chat session", id))
    }

    async fn delete_session(&self, user_id: i64, id: i64) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let deleted = diesel::delete(
                    chat_sessions::table
                        .filter(chat_sessions::id.eq(id))
                        .filter(chat_sessions::user_id.eq(user_id)),
                )
                .execute(conn)
                .await?;
                if deleted == 0 {
                    return Err(not_found("chat session", id));
                }
                diesel::delete(
                    chat_messages::table
                        .filter(chat_messages::session_id.eq(id))
                        .filter(chat_messages::user_id.eq(user_id)),
                )
                .execute(conn)
                .await?;
                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn list_messages(&self, query: &MessageQuery) -> StoreResult<Vec<ChatMessage>> {
        let mut conn = self.conn().await?;

        let mut q = chat_messages::table
            .filter(chat_messages::user_id.eq(query.user_id))
            .filter(chat_messages::session_id.eq(query.session_id))
            .into_boxed();

        if let Some(msg_type) = query.msg_type {
            q = q.filter(chat_messages::msg_type.eq(msg_type));
        }
        if !query.roles.is_empty() {
            q = q.filter(chat_messages::role.eq_any(query.roles.clone()));
        }
        if !query.ids.is_empty() {
            q = q.filter(chat_messages::id.eq_any(query.ids.clone()));
        }
        if !query.parent_ids.is_empty() {
            q = q.filter(chat_messages::parent_id.eq_any(query.parent_ids.clone()));
        }
        if let Some(from_id) = query.from_id {
            q = q.filter(chat_messages::id.ge(from_id));
        }
        if let Some(before_id) = query.before_id {
            q = q.filter(chat_messages::id.lt(before_id));
        }
        if let Some(limit) = query.limit {
            q = q.limit(limit);
        }

        Ok(q.order(chat_messages::id.desc())
            .select(ChatMessage::as_select())
            .load(&mut conn)
            .await?)
    }

    async fn get_message(&self, user_id: i64, id: i64) -> StoreResult<ChatMessage> {
        let mut conn = self.conn().await?;
        chat_messages::table
            .filter(chat_messages::id.eq(id))
            .filter(chat_messages::user_id.eq(user_id))
            .select(ChatMessage::as_select())
            .first(&mut conn)
            .await
            .optional()?
            .ok_or_else(|| not_found("message", id))
    }

    async fn has_tagged_message(&self, user_id: i64, tag: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        let found = chat_messages::table
            .filter(chat_messages::user_id.eq(user_id))
            .filter(chat_messages::tags.contains(vec![tag.to_string()]))
            .select(chat_messages::id)
            .first::<i64>(&mut conn)
            .await
            .optional()?;
        Ok(found.is_some())
    }

    async fn insert_messages(&self, messages: Vec<ChatMessage>) -> StoreResult<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        // a single multi-row INSERT is atomic on its own
        diesel::insert_into(chat_messages::table)
            .values(&messages)
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    async fn update_messages(
        &self,
        user_id: i64,
        changes: Vec<(i64, UpdateChatMessage)>,
    ) -> StoreResult<Vec<ChatMessage>> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                let mut updated = Vec::with_capacity(changes.len());
                let now = Utc::now();
                for (id, change) in &changes {
                    let message = diesel::update(
                        chat_messages::table
                            .filter(chat_messages::id.eq(*id))
                            .filter(chat_messages::user_id.eq(user_id)),
                    )
                    .set((change, chat_messages::updated_at.eq(now)))
                    .returning(ChatMessage::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or_else(|| not_found("message", *id))?;
                    updated.push(message);
                }
                Ok(updated)
            }
            .scope_boxed()
        })
        .await
    }

    async fn delete_messages(
        &self,
        user_id: i64,
        session_id: i64,
        ids: &[i64],
    ) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(diesel::delete(
            chat_messages::table
                .filter(chat_messages::user_id.eq(user_id))
                .filter(chat_messages::session_id.eq(session_id))
                .filter(chat_messages::id.eq_any(ids)),
        )
        .execute(&mut conn)
        .await?)
    }

    async fn insert_demo_rows(&self, rows: DemoRows) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.transaction::<_, StoreError, _>(|conn| {
            async move {
                diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
                    .bind::<Text, _>(format!("demo:{}", rows.user_id))
                    .execute(conn)
                    .await?;
                let seeded = chat_messages::table
                    .filter(chat_messages::user_id.eq(rows.user_id))
                    .filter(chat_messages::tags.contains(vec![TAG_DEMO.to_string()]))
                    .select(chat_messages::id)
                    .first::<i64>(conn)
                    .await
                    .optional()?;
                if seeded.is_some() {
                    debug!("Demo data already present for user {}", rows.user_id);
                    return Ok(false);
                }

                if !rows.profiles.is_empty() {
                    diesel::insert_into(profiles::table)
                        .values(&rows.profiles)
                        .execute(conn)
                        .await?;
                }
                if !rows.sessions.is_empty() {
                    diesel::insert_into(chat_sessions::table)
                        .values(&rows.sessions)
                        .execute(conn)
                        .await?;
                }
                if !rows.messages.is_empty() {
                    diesel::insert_into(chat_messages::table)
                        .values(&rows.messages)
                        .execute(conn)
                        .await?;
                }
                Ok(true)
            }
            .scope_boxed()
        })
        .await
    }

    async fn load_configs(&self, filter: &ConfigFilter) -> StoreResult<Vec<AppConfig>> {
        let mut conn = self.conn().await?;

        let mut q = configs::table.into_boxed();
        if let Some(key) = &filter.key {
            q = q.filter(configs::config_key.eq(key.clone()));
        }
        if let Some(env) = &filter.env {
            q = q.filter(configs::env.eq(env.clone()).or(configs::env.eq("")));
        }
        if let Some(app) = &filter.app {
            q = q.filter(configs::app.eq(app.clone()).or(configs::app.eq("")));
        }
        if let Some(platform) = &filter.platform {
            q = q.filter(configs::platform.eq(platform.clone()).or(configs::platform.eq("")));
        }

        Ok(q.order(configs::id.asc())
            .select(AppConfig::as_select())
            .load(&mut conn)
            .await?)
    }
}
