// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

//! Serde adapters for 64-bit identifiers.
//!
//! Snowflake ids do not fit in a JavaScript number, so they leave the API as
//! decimal strings. Incoming documents (templates, requests) may carry either
//! form, and `0` / `""` stand for "no reference".

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Num(i64),
    Text(String),
}

impl IdRepr {
    fn into_id<E: serde::de::Error>(self) -> Result<i64, E> {
        match self {
            IdRepr::Num(n) => Ok(n),
            IdRepr::Text(s) if s.is_empty() => Ok(0),
            IdRepr::Text(s) => s
                .parse::<i64>()
                .map_err(|_| E::custom(format!("invalid id: {s}"))),
        }
    }
}

/// Required id, serialized as a string.
pub mod id {
    use super::*;

    pub fn serialize<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        IdRepr::deserialize(deserializer)?.into_id()
    }
}

/// Optional reference; zero and empty strings read as `None`.
pub mod opt_id {
    use super::*;

    pub fn serialize<S: Serializer>(id: &Option<i64>, serializer: S) -> Result<S::Ok, S::Error> {
        match id {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<i64>, D::Error> {
        match Option::<IdRepr>::deserialize(deserializer)? {
            Some(repr) => Ok(Some(repr.into_id()?).filter(|id| *id != 0)),
            None => Ok(None),
        }
    }
}

/// Parses a client-supplied id, treating anything unparsable as absent.
pub fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
