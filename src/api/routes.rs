// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::domain::ConfigScope;
use crate::error::{AppError, AppResult};
use crate::models::ids::parse_id;

pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_APP_VERSION: &str = "x-app-version";
pub const HEADER_APP_ENV: &str = "x-app-env";
pub const HEADER_APP_NAME: &str = "x-app-name";
pub const HEADER_PLATFORM: &str = "x-app-platform";

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a success response with data
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Wraps a successful result in the response envelope.
pub fn respond<T: Serialize>(result: AppResult<T>) -> AppResult<Json<ApiResponse<T>>> {
    result.map(|data| Json(ApiResponse::success(data)))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("")
}

/// Authenticated caller, as forwarded by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub i64);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parse_id(header(&parts.headers, HEADER_USER_ID))
            .map(Caller)
            .ok_or(AppError::ParamMissing)
    }
}

/// Client version and environment used to pick config rows
#[derive(Debug, Clone, Default)]
pub struct ClientScope(pub ConfigScope);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientScope {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        Ok(ClientScope(ConfigScope {
            version: header(headers, HEADER_APP_VERSION).to_string(),
            env: header(headers, HEADER_APP_ENV).to_string(),
            app: header(headers, HEADER_APP_NAME).to_string(),
            platform: header(headers, HEADER_PLATFORM).to_string(),
        }))
    }
}

/// Splits a comma separated query value, dropping empty items
pub fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}
