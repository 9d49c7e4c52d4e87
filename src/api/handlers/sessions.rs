// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use super::profiles::{path_id, NewProfileBody};
use crate::api::routes::{respond, ApiResponse, Caller};
use crate::domain::chat_session::{
    create_chat_session, delete_chat_session, list_chat_sessions, update_chat_session,
};
use crate::error::AppResult;
use crate::models::ChatSession;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RenameBody {
    pub name: String,
    pub avatar: String,
}

pub async fn list(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> AppResult<Json<ApiResponse<Vec<ChatSession>>>> {
    respond(list_chat_sessions(state.store.as_ref(), user_id).await)
}

pub async fn create(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(body): Json<NewProfileBody>,
) -> AppResult<Json<ApiResponse<ChatSession>>> {
    let ids = state.ids.as_ref();
    respond(create_chat_session(state.store.as_ref(), ids, user_id, body.into()).await)
}

pub async fn update(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
    Json(body): Json<RenameBody>,
) -> AppResult<Json<ApiResponse<ChatSession>>> {
    let id = path_id(&id)?;
    respond(update_chat_session(state.store.as_ref(), user_id, id, &body.name, &body.avatar).await)
}

pub async fn delete(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let id = path_id(&id)?;
    respond(delete_chat_session(state.store.as_ref(), user_id, id).await)
}
