// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use super::ids;
use crate::schema::chat_messages;

/// Tag stamped on every message copied from a demo template
pub const TAG_DEMO: &str = "demo";
/// Tag on synthesized guide messages the client must render read-only
pub const TAG_DISABLE_INTERACT: &str = "disable_interact";
/// Tag on generated consult replies
pub const TAG_AI_REPLY: &str = "ai_reply";
/// Direction tag on a translation of the account owner's message
pub const TAG_TO_FRIEND: &str = "to_friend";
/// Direction tag on a translation of the friend's message
pub const TAG_TO_USER: &str = "to_user";

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Who authored a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
pub enum MessageRole {
    /// The account owner, inside the logged friend conversation
    #[serde(rename = "SELF")]
    Myself,
    #[serde(rename = "FRIEND")]
    Friend,
    #[serde(rename = "AI")]
    Ai,
    /// The account owner, talking to the coach
    #[default]
    #[serde(rename = "USER")]
    User,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Myself => "SELF",
            MessageRole::Friend => "FRIEND",
            MessageRole::Ai => "AI",
            MessageRole::User => "USER",
        }
    }

    /// Speaker label used inside prompt transcripts
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::Myself | MessageRole::User => "User",
            MessageRole::Friend => "Friend",
            MessageRole::Ai => "AI",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SELF" => Ok(MessageRole::Myself),
            "FRIEND" => Ok(MessageRole::Friend),
            "AI" => Ok(MessageRole::Ai),
            "USER" => Ok(MessageRole::User),
            other => Err(UnknownVariant { kind: "message role", value: other.to_string() }),
        }
    }
}

impl ToSql<Text, Pg> for MessageRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for MessageRole {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(raw.parse()?)
    }
}

/// What kind of log entry a message is
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// A line of the real conversation with the friend
    #[default]
    History,
    /// A turn of the advice thread with the coach
    Consult,
    /// An AI reinterpretation attached to its parent message
    Translate,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::History => "HISTORY",
            MessageType::Consult => "CONSULT",
            MessageType::Translate => "TRANSLATE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HISTORY" => Ok(MessageType::History),
            "CONSULT" => Ok(MessageType::Consult),
            "TRANSLATE" => Ok(MessageType::Translate),
            other => Err(UnknownVariant { kind: "message type", value: other.to_string() }),
        }
    }
}

impl ToSql<Text, Pg> for MessageType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<Text, Pg> for MessageType {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        Ok(raw.parse()?)
    }
}

/// One row of the append-only message log
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[derive(Queryable, Selectable, Insertable)]
#[diesel(table_name = chat_messages)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[serde(default)]
pub struct ChatMessage {
    #[serde(with = "ids::id")]
    pub id: i64,
    #[serde(with = "ids::id")]
    pub user_id: i64,
    #[serde(with = "ids::id")]
    pub session_id: i64,
    #[serde(with = "ids::opt_id")]
    pub parent_id: Option<i64>,
    #[serde(with = "ids::opt_id")]
    pub profile_id: Option<i64>,
    pub role: MessageRole,
    pub msg_type: MessageType,
    pub content: String,
    pub tags: Vec<String>,
    pub msg_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Renders the message as one transcript line.
    pub fn history_line(&self) -> String {
        match self.msg_type {
            MessageType::Translate => {
                format!("<AI interpretation>{}</AI interpretation>", self.content)
            }
            _ => format!("{}:{}", self.role.label(), self.content),
        }
    }
}

/// Partial update; `None` leaves the column untouched
#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = chat_messages)]
pub struct UpdateChatMessage {
    pub content: Option<String>,
    pub role: Option<MessageRole>,
    pub msg_type: Option<MessageType>,
    pub tags: Option<Vec<String>>,
}

impl UpdateChatMessage {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.role.is_none()
            && self.msg_type.is_none()
            && self.tags.is_none()
    }

    pub fn apply_to(&self, message: &mut ChatMessage) {
        if let Some(content) = &self.content {
            message.content = content.clone();
        }
        if let Some(role) = self.role {
            message.role = role;
        }
        if let Some(msg_type) = self.msg_type {
            message.msg_type = msg_type;
        }
        if let Some(tags) = &self.tags {
            message.tags = tags.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_use_wire_names() {
        let json = serde_json::to_string(&MessageRole::Myself).unwrap();
        assert_eq!(json, "\"SELF\"");
        let parsed: MessageType = serde_json::from_str("\"TRANSLATE\"").unwrap();
        assert_eq!(parsed, MessageType::Translate);
        assert!("BOT".parse::<MessageRole>().is_err());
    }

    #[test]
    fn history_line_formats_by_type() {
        let line = ChatMessage {
            role: MessageRole::Friend,
            msg_type: MessageType::History,
            content: "are you free tonight?".into(),
            ..Default::default()
        };
        assert_eq!(line.history_line(), "Friend:are you free tonight?");

        let translation = ChatMessage {
            role: MessageRole::Ai,
            msg_type: MessageType::Translate,
            content: "she wants to meet".into(),
            ..Default::default()
        };
        assert_eq!(
            translation.history_line(),
            "<AI interpretation>she wants to meet</AI interpretation>"
        );
    }

    #[test]
    fn template_messages_tolerate_missing_fields() {
        let msg: ChatMessage = serde_json::from_str(
            r#"{"id": 2, "parent_id": 1, "role": "AI", "msg_type": "CONSULT", "content": "hi"}"#,
        )
        .unwrap();
        assert_eq!(msg.parent_id, Some(1));
        assert!(msg.tags.is_empty());
        assert_eq!(msg.session_id, 0);
    }
}
