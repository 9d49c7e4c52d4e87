// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::ids;
use crate::schema::chat_sessions;

/// A conversation thread between a user and one friend profile
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = chat_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct ChatSession {
    #[serde(with = "ids::id")]
    pub id: i64,
    // Denormalized from the friend profile for display
    pub name: String,
    #[serde(with = "ids::id")]
    pub user_id: i64,
    #[serde(with = "ids::opt_id")]
    pub profile_id: Option<i64>,
    pub avatar: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = chat_sessions)]
pub struct UpdateChatSession {
    pub name: Option<String>,
    pub avatar: Option<String>,
}

impl UpdateChatSession {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.avatar.is_none()
    }
}
