// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Jsonb;
use serde::{Deserialize, Serialize};
use std::io::Write;

use super::ids;
use crate::schema::profiles;

pub const GENDER_MALE: &str = "male";
pub const GENDER_FEMALE: &str = "female";

/// Free-form name/value attribute attached to a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

/// Custom attribute list, stored as a jsonb array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Jsonb)]
#[serde(transparent)]
pub struct Properties(pub Vec<Property>);

impl FromSql<Jsonb, Pg> for Properties {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let value = <serde_json::Value as FromSql<Jsonb, Pg>>::from_sql(bytes)?;
        Ok(serde_json::from_value(value)?)
    }
}

impl ToSql<Jsonb, Pg> for Properties {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        // jsonb binary format version
        out.write_all(&[1])?;
        serde_json::to_writer(out, &self.0)?;
        Ok(IsNull::No)
    }
}

/// A person's descriptive data: the account owner or one of their friends
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = profiles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct Profile {
    #[serde(with = "ids::id")]
    pub id: i64,
    #[serde(with = "ids::id")]
    pub user_id: i64,
    pub name: String,
    pub im_name: String,
    pub avatar: String,
    #[serde(with = "ids::opt_id")]
    pub avatar_file_id: Option<i64>,
    pub age: i32,
    pub gender: String,
    /// Persona prompt; read from templates but never sent to clients
    #[serde(skip_serializing)]
    pub prompt: String,
    #[serde(rename = "desc")]
    pub intro: String,
    pub custom: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    fn gender_label(&self) -> Option<&'static str> {
        match self.gender.as_str() {
            GENDER_MALE => Some("Male"),
            GENDER_FEMALE => Some("Female"),
            _ => None,
        }
    }

    /// Descriptive attributes as `name:value` lines for prompt context.
    pub fn property_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.gender.is_empty() {
            lines.push(format!("Gender:{}", self.gender_label().unwrap_or("")));
        }
        if self.age > 0 {
            lines.push(format!("Age:{} years", self.age));
        }
        if !self.intro.is_empty() {
            lines.push(format!("Intro:{}", self.intro));
        }
        for property in &self.custom.0 {
            lines.push(format!("{}:{}", property.name, property.value));
        }
        lines
    }

    /// Renders the attribute block headed by `who`, or nothing when the
    /// profile carries no attributes.
    pub fn describe(&self, who: &str) -> Option<String> {
        let lines = self.property_lines();
        if lines.is_empty() {
            return None;
        }
        Some(format!("\n**{} profile**\n{}\n", who, lines.join("\n")))
    }
}

pub fn is_valid_gender(gender: &str) -> bool {
    gender.is_empty() || gender == GENDER_MALE || gender == GENDER_FEMALE
}

/// Changes applied by a profile update; `None` leaves the column untouched
#[derive(Debug, Default, Clone, AsChangeset)]
#[diesel(table_name = profiles)]
pub struct UpdateProfile {
    pub name: Option<String>,
    pub im_name: Option<String>,
    pub avatar: Option<String>,
    pub avatar_file_id: Option<i64>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub intro: Option<String>,
    pub custom: Option<Properties>,
}

impl UpdateProfile {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.im_name.is_none()
            && self.avatar.is_none()
            && self.avatar_file_id.is_none()
            && self.gender.is_none()
            && self.age.is_none()
            && self.intro.is_none()
            && self.custom.is_none()
    }

    /// Drops blank values so they leave the stored fields untouched: empty
    /// strings, a non-positive age and an empty attribute list.
    pub fn without_blanks(self) -> Self {
        fn filled(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }
        Self {
            name: filled(self.name),
            im_name: filled(self.im_name),
            avatar: filled(self.avatar),
            avatar_file_id: self.avatar_file_id.filter(|id| *id > 0),
            gender: filled(self.gender),
            age: self.age.filter(|age| *age > 0),
            intro: filled(self.intro),
            custom: self.custom.filter(|custom| !custom.0.is_empty()),
        }
    }

    pub fn apply_to(&self, profile: &mut Profile) {
        if let Some(name) = &self.name {
            profile.name = name.clone();
        }
        if let Some(im_name) = &self.im_name {
            profile.im_name = im_name.clone();
        }
        if let Some(avatar) = &self.avatar {
            profile.avatar = avatar.clone();
        }
        if let Some(file_id) = self.avatar_file_id {
            profile.avatar_file_id = Some(file_id);
        }
        if let Some(gender) = &self.gender {
            profile.gender = gender.clone();
        }
        if let Some(age) = self.age {
            profile.age = age;
        }
        if let Some(intro) = &self.intro {
            profile.intro = intro.clone();
        }
        if let Some(custom) = &self.custom {
            profile.custom = custom.clone();
        }
    }
}
