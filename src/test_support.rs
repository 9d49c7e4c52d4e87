// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

//! In-memory collaborators for unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use crate::ai::{AiError, CompletionProvider, PromptMessage};
use crate::idgen::IdSource;
use crate::models::chat_message::TAG_DEMO;
use crate::models::user_file::FILE_STATUS_NORMAL;
use crate::models::{
    AppConfig, ChatMessage, ChatSession, Profile, UpdateChatMessage, UpdateChatSession,
    UpdateProfile, User, UserFile,
};
use crate::state::AppState;
use crate::store::{
    ChatStore, ConfigFilter, DemoRows, MessageQuery, ProfileQuery, StoreError, StoreResult,
};

#[derive(Default, Clone)]
struct Tables {
    users: Vec<User>,
    profiles: Vec<Profile>,
    sessions: Vec<ChatSession>,
    messages: Vec<ChatMessage>,
    configs: Vec<AppConfig>,
    files: Vec<UserFile>,
}

/// [`ChatStore`] over plain vectors with switchable write failures
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    panic_on_write: AtomicBool,
    fail_demo_inserts: AtomicBool,
}

fn not_found(what: &str, id: i64) -> StoreError {
    StoreError::NotFound(format!("{what} {id}"))
}

impl MemoryStore {
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    pub fn panic_on_write(&self, on: bool) {
        self.panic_on_write.store(on, Ordering::SeqCst);
    }

    pub fn fail_demo_inserts(&self, on: bool) {
        self.fail_demo_inserts.store(on, Ordering::SeqCst);
    }

    pub async fn put_config(&self, config: AppConfig) {
        self.tables.lock().await.configs.push(config);
    }

    pub async fn put_session(&self, session: ChatSession) {
        self.tables.lock().await.sessions.push(session);
    }

    pub async fn put_file(&self, file: UserFile) {
        self.tables.lock().await.files.push(file);
    }

    pub async fn put_user_with_profile(&self, user_id: i64, profile_id: i64) {
        let mut tables = self.tables.lock().await;
        tables.users.push(User {
            id: user_id,
            profile_id: Some(profile_id),
            ..Default::default()
        });
        tables.profiles.push(Profile {
            id: profile_id,
            user_id,
            name: "Me".into(),
            ..Default::default()
        });
    }

    pub async fn put_profile(&self, profile: Profile) {
        self.tables.lock().await.profiles.push(profile);
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }

    pub async fn profile_count(&self) -> usize {
        self.tables.lock().await.profiles.len()
    }

    pub async fn session_count(&self, user_id: i64) -> usize {
        let tables = self.tables.lock().await;
        tables.sessions.iter().filter(|s| s.user_id == user_id).count()
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.panic_on_write.load(Ordering::SeqCst) {
            panic!("write panicked");
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Pool("write failed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn find_or_create_user(&self, user: User, profile: Profile) -> StoreResult<(User, bool)> {
        let mut tables = self.tables.lock().await;
        let existing = tables.users.iter().find(|u| {
            (user.external_id().is_some() && u.external_id() == user.external_id())
                || (user.phone().is_some() && u.phone() == user.phone())
        });
        if let Some(existing) = existing {
            return Ok((existing.clone(), false));
        }
        // yield while holding the lock so racing callers really queue up
        tokio::task::yield_now().await;
        self.check_write()?;

        let created = User { profile_id: Some(profile.id), ..user };
        tables.users.push(created.clone());
        tables.profiles.push(profile);
        Ok((created, true))
    }

    async fn get_user(&self, id: i64) -> StoreResult<User> {
        let tables = self.tables.lock().await;
        tables.users.iter().find(|u| u.id == id).cloned().ok_or_else(|| not_found("user", id))
    }

    async fn get_profile(&self, user_id: i64, id: i64) -> StoreResult<Profile> {
        let tables = self.tables.lock().await;
        tables
            .profiles
            .iter()
            .find(|p| p.id == id && p.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("profile", id))
    }

    async fn get_profiles(&self, user_id: i64, ids: &[i64]) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .profiles
            .iter()
            .filter(|p| p.user_id == user_id && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn list_profiles(&self, query: &ProfileQuery) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<Profile> =
            tables.profiles.iter().filter(|p| query.matches(p)).cloned().collect();
        found.sort_by_key(|p| p.id);
        found.truncate(query.limit.max(0) as usize);
        Ok(found)
    }

    async fn create_profile(&self, profile: Profile) -> StoreResult<Profile> {
        self.check_write()?;
        self.tables.lock().await.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn update_profile(
        &self,
        user_id: i64,
        id: i64,
        changes: UpdateProfile,
    ) -> StoreResult<Profile> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let profile = tables
            .profiles
            .iter_mut()
            .find(|p| p.id == id && p.user_id == user_id)
            .ok_or_else(|| not_found("profile", id))?;
        changes.apply_to(profile);
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn delete_profile(&self, user_id: i64, id: i64) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let before = tables.profiles.len();
        tables.profiles.retain(|p| !(p.id == id && p.user_id == user_id));
        if tables.profiles.len() == before {
            return Err(not_found("profile", id));
        }
        Ok(())
    }

    async fn get_user_file(&self, user_id: i64, id: i64) -> StoreResult<UserFile> {
        let tables = self.tables.lock().await;
        tables
            .files
            .iter()
            .find(|f| f.id == id && f.user_id == user_id && f.status == FILE_STATUS_NORMAL)
            .cloned()
            .ok_or_else(|| not_found("file", id))
    }

    async fn set_file_usage(&self, id: i64, usage_type: &str) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        if let Some(file) = tables.files.iter_mut().find(|f| f.id == id) {
            file.usage_type = usage_type.to_string();
        }
        Ok(())
    }

    async fn create_session(
        &self,
        profile: Profile,
        session: ChatSession,
    ) -> StoreResult<ChatSession> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        tables.profiles.push(profile);
        tables.sessions.push(session.clone());
        Ok(session)
    }

    async fn get_session(&self, user_id: i64, id: i64) -> StoreResult<ChatSession> {
        let tables = self.tables.lock().await;
        tables
            .sessions
            .iter()
            .find(|s| s.id == id && s.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("chat session", id))
    }

    async fn list_sessions(&self, user_id: i64) -> StoreResult<Vec<ChatSession>> {
        let tables = self.tables.lock().await;
        let mut sessions: Vec<ChatSession> =
            tables.sessions.iter().filter(|s| s.user_id == user_id).cloned().collect();
        sessions.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(sessions)
    }

    async fn update_session(
        &self,
        user_id: i64,
        id: i64,
        changes: UpdateChatSession,
    ) -> StoreResult<ChatSession> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user_id)
            .ok_or_else(|| not_found("chat session", id))?;
        if let Some(name) = changes.name {
            session.name = name;
        }
        if let Some(avatar) = changes.avatar {
            session.avatar = avatar;
        }
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    async fn delete_session(&self, user_id: i64, id: i64) -> StoreResult<()> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|s| !(s.id == id && s.user_id == user_id));
        if tables.sessions.len() == before {
            return Err(not_found("chat session", id));
        }
        tables.messages.retain(|m| !(m.session_id == id && m.user_id == user_id));
        Ok(())
    }

    async fn list_messages(&self, query: &MessageQuery) -> StoreResult<Vec<ChatMessage>> {
        let tables = self.tables.lock().await;
        let mut found: Vec<ChatMessage> =
            tables.messages.iter().filter(|m| query.matches(m)).cloned().collect();
        found.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(limit) = query.limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }

    async fn get_message(&self, user_id: i64, id: i64) -> StoreResult<ChatMessage> {
        let tables = self.tables.lock().await;
        tables
            .messages
            .iter()
            .find(|m| m.id == id && m.user_id == user_id)
            .cloned()
            .ok_or_else(|| not_found("message", id))
    }

    async fn has_tagged_message(&self, user_id: i64, tag: &str) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.messages.iter().any(|m| m.user_id == user_id && m.has_tag(tag)))
    }

    async fn insert_messages(&self, messages: Vec<ChatMessage>) -> StoreResult<()> {
        self.check_write()?;
        self.tables.lock().await.messages.extend(messages);
        Ok(())
    }

    async fn update_messages(
        &self,
        user_id: i64,
        changes: Vec<(i64, UpdateChatMessage)>,
    ) -> StoreResult<Vec<ChatMessage>> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        // validate first so a missing row leaves everything untouched
        for (id, _) in &changes {
            if !tables.messages.iter().any(|m| m.id == *id && m.user_id == user_id) {
                return Err(not_found("message", *id));
            }
        }
        let now = Utc::now();
        let mut updated = Vec::with_capacity(changes.len());
        for (id, change) in &changes {
            let found = tables.messages.iter_mut().find(|m| m.id == *id && m.user_id == user_id);
            if let Some(message) = found {
                change.apply_to(message);
                message.updated_at = now;
                updated.push(message.clone());
            }
        }
        Ok(updated)
    }

    async fn delete_messages(
        &self,
        user_id: i64,
        session_id: i64,
        ids: &[i64],
    ) -> StoreResult<usize> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let before = tables.messages.len();
        tables.messages.retain(|m| {
            !(m.user_id == user_id && m.session_id == session_id && ids.contains(&m.id))
        });
        Ok(before - tables.messages.len())
    }

    async fn insert_demo_rows(&self, rows: DemoRows) -> StoreResult<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().await;
        let seeded = tables
            .messages
            .iter()
            .any(|m| m.user_id == rows.user_id && m.has_tag(TAG_DEMO));
        if seeded {
            return Ok(false);
        }
        // let racing seeders queue up on the lock
        tokio::task::yield_now().await;

        let snapshot = tables.clone();
        tables.profiles.extend(rows.profiles);
        if self.fail_demo_inserts.load(Ordering::SeqCst) {
            *tables = snapshot;
            return Err(StoreError::Pool("demo session insert failed".into()));
        }
        tables.sessions.extend(rows.sessions);
        tables.messages.extend(rows.messages);
        Ok(true)
    }

    async fn load_configs(&self, filter: &ConfigFilter) -> StoreResult<Vec<AppConfig>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<AppConfig> =
            tables.configs.iter().filter(|c| filter.matches(c)).cloned().collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }
}

/// Hands out consecutive ids. Every existing id counts as older than any
/// future instant.
pub struct SequentialIds {
    next: AtomicI64,
}

impl SequentialIds {
    pub fn starting_at(first: i64) -> Self {
        Self { next: AtomicI64::new(first) }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    fn id_at(&self, time: DateTime<Utc>) -> i64 {
        if time <= Utc::now() {
            0
        } else {
            i64::MAX
        }
    }
}

/// Completion backend with a canned answer that records what it was sent
pub struct FakeCompletion {
    reply: Option<String>,
    requests: StdMutex<Vec<Vec<PromptMessage>>>,
}

impl FakeCompletion {
    pub fn replying(reply: &str) -> Self {
        Self { reply: Some(reply.to_string()), requests: StdMutex::new(Vec::new()) }
    }

    pub fn failing() -> Self {
        Self { reply: None, requests: StdMutex::new(Vec::new()) }
    }

    pub fn last_request(&self) -> Option<Vec<PromptMessage>> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl CompletionProvider for FakeCompletion {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AiError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(AiError::Api { status: 503, message: "model unavailable".into() }),
        }
    }
}

pub fn test_state(
    store: Arc<MemoryStore>,
    ids: Arc<SequentialIds>,
    ai: Arc<FakeCompletion>,
) -> AppState {
    AppState::new(store, ids, ai)
}
