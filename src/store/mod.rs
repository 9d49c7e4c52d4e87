// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

//! Persistence boundary.
//!
//! Every multi-row mutation on [`ChatStore`] is atomic: implementations either
//! commit all rows of a call or none of them.

pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    AppConfig, ChatMessage, ChatSession, MessageRole, MessageType, Profile, UpdateChatMessage,
    UpdateChatSession, UpdateProfile, User, UserFile,
};

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Diesel(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("{0} not found")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Filter for one user's messages in one session.
///
/// Results are always ordered by id, newest first.
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub user_id: i64,
    pub session_id: i64,
    pub msg_type: Option<MessageType>,
    pub roles: Vec<MessageRole>,
    pub ids: Vec<i64>,
    pub parent_ids: Vec<i64>,
    /// Inclusive lower id bound
    pub from_id: Option<i64>,
    /// Exclusive upper id bound
    pub before_id: Option<i64>,
    pub limit: Option<i64>,
}

impl MessageQuery {
    pub fn new(user_id: i64, session_id: i64) -> Self {
        Self { user_id, session_id, ..Default::default() }
    }

    /// Whether `message` passes every filter except the limit.
    pub fn matches(&self, message: &ChatMessage) -> bool {
        message.user_id == self.user_id
            && message.session_id == self.session_id
            && self.msg_type.map_or(true, |t| message.msg_type == t)
            && (self.roles.is_empty() || self.roles.contains(&message.role))
            && (self.ids.is_empty() || self.ids.contains(&message.id))
            && (self.parent_ids.is_empty()
                || message.parent_id.map_or(false, |p| self.parent_ids.contains(&p)))
            && self.from_id.map_or(true, |from| message.id >= from)
            && self.before_id.map_or(true, |before| message.id < before)
    }
}

/// One page of a user's profiles, ordered by id ascending.
#[derive(Debug, Clone, Default)]
pub struct ProfileQuery {
    pub user_id: i64,
    /// Substring of `name` or `im_name`; empty matches everything
    pub search: String,
    /// Exclusive lower id bound
    pub after_id: Option<i64>,
    pub limit: i64,
}

impl ProfileQuery {
    /// Whether `profile` passes every filter except the limit.
    pub fn matches(&self, profile: &Profile) -> bool {
        profile.user_id == self.user_id
            && (self.search.is_empty()
                || profile.name.contains(&self.search)
                || profile.im_name.contains(&self.search))
            && self.after_id.map_or(true, |after| profile.id > after)
    }
}

/// Which config rows to load; `None` fields are not filtered.
///
/// `env`, `app` and `platform` match rows carrying the requested value or
/// an empty one.
#[derive(Debug, Clone, Default)]
pub struct ConfigFilter {
    pub key: Option<String>,
    pub env: Option<String>,
    pub app: Option<String>,
    pub platform: Option<String>,
}

impl ConfigFilter {
    pub fn matches(&self, row: &AppConfig) -> bool {
        fn scoped(wanted: &Option<String>, actual: &str) -> bool {
            wanted.as_deref().map_or(true, |w| actual.is_empty() || actual == w)
        }
        self.key.as_deref().map_or(true, |k| row.key == k)
            && scoped(&self.env, &row.env)
            && scoped(&self.app, &row.app)
            && scoped(&self.platform, &row.platform)
    }
}

/// Rows produced by one seeding run for `user_id`, inserted in one
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct DemoRows {
    pub user_id: i64,
    pub profiles: Vec<Profile>,
    pub sessions: Vec<ChatSession>,
    pub messages: Vec<ChatMessage>,
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // Users

    /// Returns the user owning any identity of `user`, or inserts `user`
    /// together with its root `profile`. The flag tells whether rows were
    /// created. Concurrent calls for the same identity are serialized.
    async fn find_or_create_user(&self, user: User, profile: Profile) -> StoreResult<(User, bool)>;

    async fn get_user(&self, id: i64) -> StoreResult<User>;

    // Profiles

    async fn get_profile(&self, user_id: i64, id: i64) -> StoreResult<Profile>;

    /// Profiles of `user_id` among `ids`; unknown ids are skipped.
    async fn get_profiles(&self, user_id: i64, ids: &[i64]) -> StoreResult<Vec<Profile>>;

    async fn list_profiles(&self, query: &ProfileQuery) -> StoreResult<Vec<Profile>>;

    async fn create_profile(&self, profile: Profile) -> StoreResult<Profile>;

    async fn update_profile(
        &self,
        user_id: i64,
        id: i64,
        changes: UpdateProfile,
    ) -> StoreResult<Profile>;

    async fn delete_profile(&self, user_id: i64, id: i64) -> StoreResult<()>;

    // Files

    async fn get_user_file(&self, user_id: i64, id: i64) -> StoreResult<UserFile>;

    async fn set_file_usage(&self, id: i64, usage_type: &str) -> StoreResult<()>;

    // Sessions

    /// Inserts the friend profile and then the session referencing it.
    async fn create_session(
        &self,
        profile: Profile,
        session: ChatSession,
    ) -> StoreResult<ChatSession>;

    async fn get_session(&self, user_id: i64, id: i64) -> StoreResult<ChatSession>;

    /// Sessions of a user, newest first.
    async fn list_sessions(&self, user_id: i64) -> StoreResult<Vec<ChatSession>>;

    async fn update_session(
        &self,
        user_id: i64,
        id: i64,
        changes: UpdateChatSession,
    ) -> StoreResult<ChatSession>;

    /// Deletes the session and its messages.
    async fn delete_session(&self, user_id: i64, id: i64) -> StoreResult<()>;

    // Messages

    async fn list_messages(&self, query: &MessageQuery) -> StoreResult<Vec<ChatMessage>>;

    async fn get_message(&self, user_id: i64, id: i64) -> StoreResult<ChatMessage>;

    async fn has_tagged_message(&self, user_id: i64, tag: &str) -> StoreResult<bool>;

    async fn insert_messages(&self, messages: Vec<ChatMessage>) -> StoreResult<()>;

    /// Applies every change or none; a message not owned by `user_id`
    /// fails the whole batch with `NotFound`.
    async fn update_messages(
        &self,
        user_id: i64,
        changes: Vec<(i64, UpdateChatMessage)>,
    ) -> StoreResult<Vec<ChatMessage>>;

    /// Returns the number of deleted rows.
    async fn delete_messages(
        &self,
        user_id: i64,
        session_id: i64,
        ids: &[i64],
    ) -> StoreResult<usize>;

    // Seeding

    /// Inserts profiles, then sessions, then messages, unless the user
    /// already owns a demo-tagged message. The check and the inserts hold a
    /// per-user lock, so concurrent runs seed at most once. Returns whether
    /// rows were written.
    async fn insert_demo_rows(&self, rows: DemoRows) -> StoreResult<bool>;

    // Application config

    async fn load_configs(&self, filter: &ConfigFilter) -> StoreResult<Vec<AppConfig>>;
}
