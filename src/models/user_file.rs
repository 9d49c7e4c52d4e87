// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::ids;
use crate::schema::user_files;

/// File status constants
pub const FILE_STATUS_NORMAL: i16 = 1;

/// Usage type constants
pub const USAGE_TYPE_AVATAR: &str = "avatar";

/// Metadata of an object uploaded to storage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = user_files)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserFile {
    #[serde(with = "ids::id")]
    pub id: i64,
    #[serde(with = "ids::id")]
    pub user_id: i64,
    pub original_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub file_ext: String,
    pub storage_key: String,
    pub public_url: String,
    pub public_expire: Option<DateTime<Utc>>,
    // Content hash, used to dedupe repeated uploads
    pub file_hash: String,
    pub status: i16,
    pub usage_type: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
