// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::configs;

/// Config key holding the message skeletons shown in an empty session
pub const KEY_NEW_CHAT_GUIDE: &str = "guide_msg:on_new_chat";
/// Config key of the default consult system prompt
pub const KEY_CONSULT_PROMPT: &str = "prompt:consult:default";
/// Prompt template for translating the user's words for the friend
pub const KEY_TRANSLATE_TO_FRIEND: &str = "prompt:translate:to_friend";
/// Prompt template for translating the friend's words for the user
pub const KEY_TRANSLATE_TO_USER: &str = "prompt:translate:to_user";

/// Config key of the demo template for a gender
pub fn demo_key(gender: &str) -> String {
    format!("demo:{gender}")
}

/// One versioned, environment-scoped key/value row
#[derive(Debug, Clone, PartialEq, Default, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = configs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AppConfig {
    pub id: i64,
    #[diesel(column_name = config_key)]
    pub key: String,
    pub value: String,
    pub app: String,
    pub platform: String,
    pub env: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
