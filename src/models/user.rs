// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::ids;
use crate::schema::users;

/// Identity anchor, keyed by external login id and/or phone
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct User {
    #[serde(with = "ids::id")]
    pub id: i64,
    pub name: String,
    pub im_name: String,
    pub external_id: Option<String>,
    pub phone: Option<String>,
    pub avatar: String,
    #[serde(with = "ids::opt_id")]
    pub profile_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// External login id, if one was supplied and is non-empty
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref().filter(|s| !s.is_empty())
    }

    /// Phone number, if one was supplied and is non-empty
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().filter(|s| !s.is_empty())
    }

    /// Every identity this user can be looked up by.
    pub fn identities(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(external_id) = self.external_id() {
            keys.push(format!("external_id:{external_id}"));
        }
        if let Some(phone) = self.phone() {
            keys.push(format!("phone:{phone}"));
        }
        keys.sort();
        keys
    }
}
