// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

//! Demo onboarding: copies template conversations into a new account.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

use super::appconfig::{load_value, ConfigScope};
use super::id_remap::IdRemapper;
use crate::error::{AppError, AppResult};
use crate::idgen::IdSource;
use crate::metrics;
use crate::models::app_config::demo_key;
use crate::models::chat_message::TAG_DEMO;
use crate::models::{ids, ChatMessage, ChatSession, Profile, User};
use crate::store::{ChatStore, DemoRows, StoreError};

/// A template document of demo conversations
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DemoData {
    pub name: String,
    #[serde(with = "ids::id")]
    pub user_id: i64,
    pub demo_cases: Vec<DemoCase>,
}

/// One friend profile, its session and the messages exchanged in it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DemoCase {
    pub chat_session: ChatSession,
    pub profile: Profile,
    pub messages: Vec<ChatMessage>,
}

/// Row counts written by one seeding run. `skipped` runs found demo data
/// already present and wrote nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub skipped: bool,
    pub cases: usize,
    pub profiles: usize,
    pub sessions: usize,
    pub messages: usize,
}

static FEATURE_GUIDE: Lazy<DemoData> =
    Lazy::new(|| parse_template("feature_guide", include_str!("demo/feature_guide.json")));

/// Parses a template document; a malformed one reads as empty.
pub fn parse_template(name: &str, json: &str) -> DemoData {
    match serde_json::from_str(json) {
        Ok(data) => data,
        Err(e) => {
            error!("Failed to parse demo template {}: {}", name, e);
            DemoData::default()
        }
    }
}

/// Built-in template used when no configured one applies
pub fn feature_guide() -> &'static DemoData {
    &FEATURE_GUIDE
}

/// Resolves the demo template for a gender.
pub async fn load_template(store: &dyn ChatStore, gender: &str, scope: &ConfigScope) -> DemoData {
    let key = demo_key(gender);
    match load_value(store, &key, scope).await {
        Some(json) if !json.is_empty() => parse_template(&key, &json),
        _ => feature_guide().clone(),
    }
}

/// Stamps remapped cases with their new owner and flattens them into rows.
fn build_rows(cases: Vec<DemoCase>, user_id: i64, now: DateTime<Utc>) -> DemoRows {
    let mut rows = DemoRows { user_id, ..Default::default() };
    for case in cases {
        let mut profile = case.profile;
        profile.user_id = user_id;
        profile.created_at = now;
        profile.updated_at = now;
        rows.profiles.push(profile);

        let mut session = case.chat_session;
        session.user_id = user_id;
        session.created_at = now;
        session.updated_at = now;
        rows.sessions.push(session);

        for mut message in case.messages {
            message.user_id = user_id;
            message.tags.push(TAG_DEMO.to_string());
            if message.msg_at == DateTime::<Utc>::default() {
                message.msg_at = now;
            }
            message.created_at = now;
            message.updated_at = now;
            rows.messages.push(message);
        }
    }
    rows
}

/// Copies the demo template matching `profile`'s gender into `user`'s
/// account.
///
/// Users who already own demo-tagged messages are skipped. The store checks
/// that under a per-user lock in the same transaction that writes the rows,
/// so concurrent calls seed once. A panic while seeding is reported as an
/// internal error.
pub async fn seed_demo_data(
    store: &dyn ChatStore,
    ids: &dyn IdSource,
    user: &User,
    profile: &Profile,
    scope: &ConfigScope,
) -> AppResult<SeedSummary> {
    let template = load_template(store, &profile.gender, scope).await;
    if template.demo_cases.is_empty() {
        warn!("No demo cases found for gender {:?}", profile.gender);
        metrics::DEMO_SEEDS.with_label_values(&["empty"]).inc();
        return Ok(SeedSummary::default());
    }

    let result = AssertUnwindSafe(async {
        let cases = template.demo_cases.len();
        let remapped = IdRemapper::remap(ids, template.demo_cases);
        let rows = build_rows(remapped, user.id, Utc::now());
        let summary = SeedSummary {
            skipped: false,
            cases,
            profiles: rows.profiles.len(),
            sessions: rows.sessions.len(),
            messages: rows.messages.len(),
        };
        if store.insert_demo_rows(rows).await? {
            Ok::<_, StoreError>(summary)
        } else {
            Ok(SeedSummary { skipped: true, ..Default::default() })
        }
    })
    .catch_unwind()
    .await;

    match result {
        Ok(Ok(summary)) if summary.skipped => {
            metrics::DEMO_SEEDS.with_label_values(&["skipped"]).inc();
            info!(user_id = user.id, "Demo data already present, skipped seeding");
            Ok(summary)
        }
        Ok(Ok(summary)) => {
            metrics::DEMO_SEEDS.with_label_values(&["ok"]).inc();
            info!(
                user_id = user.id,
                cases = summary.cases,
                profiles = summary.profiles,
                sessions = summary.sessions,
                messages = summary.messages,
                "Copied demo data for new user"
            );
            Ok(summary)
        }
        Ok(Err(e)) => {
            metrics::DEMO_SEEDS.with_label_values(&["error"]).inc();
            error!("Failed to copy demo data for user {}: {}", user.id, e);
            Err(AppError::internal(e))
        }
        Err(_) => {
            metrics::DEMO_SEEDS.with_label_values(&["error"]).inc();
            error!("Panic while copying demo data for user {}", user.id);
            Err(AppError::internal("panic during demo seeding"))
        }
    }
}
