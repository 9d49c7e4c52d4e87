// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::profiles::path_id;
use crate::api::routes::{respond, split_list, ApiResponse, Caller, ClientScope};
use crate::error::{AppError, AppResult};
use crate::messages::{
    self, ConsultReply, ConsultRequest, ListFilter, ListRequest, MessagePage, MessagePatch,
    Translation,
};
use crate::models::ids::{self, parse_id};
use crate::models::{ChatMessage, MessageRole, MessageType};
use crate::state::AppState;

/// Query string of a listing; list values are comma separated
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub msg_type: String,
    pub roles: String,
    pub ids: String,
    pub parent_ids: String,
    pub page_token: String,
    pub page_size: i64,
}

impl ListParams {
    fn into_request(self, session_id: i64) -> AppResult<ListRequest> {
        let msg_type = match self.msg_type.trim() {
            "" => None,
            raw => Some(raw.parse::<MessageType>().map_err(|e| AppError::invalid(e.to_string()))?),
        };
        let roles = split_list(&self.roles)
            .map(|raw| raw.parse::<MessageRole>().map_err(|e| AppError::invalid(e.to_string())))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(ListRequest {
            session_id,
            filter: ListFilter {
                msg_type,
                roles,
                ids: split_list(&self.ids).filter_map(parse_id).collect(),
                parent_ids: split_list(&self.parent_ids).filter_map(parse_id).collect(),
            },
            page_token: self.page_token,
            page_size: self.page_size,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateBody {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateBody {
    pub messages: Vec<MessagePatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteBody {
    pub ids: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConsultBody {
    pub content: String,
    #[serde(with = "ids::opt_id")]
    pub target_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FeedbackBody {
    pub attitude: String,
}

pub async fn list(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    ClientScope(scope): ClientScope,
    Path(session_id): Path<String>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ApiResponse<MessagePage>>> {
    let request = params.into_request(path_id(&session_id)?)?;
    respond(messages::list_messages(state.store.as_ref(), user_id, &request, &scope).await)
}

pub async fn create(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(session_id): Path<String>,
    Json(body): Json<CreateBody>,
) -> AppResult<Json<ApiResponse<Vec<ChatMessage>>>> {
    let session_id = path_id(&session_id)?;
    let (store, ids) = (state.store.as_ref(), state.ids.as_ref());
    respond(messages::create_messages(store, ids, user_id, session_id, body.messages).await)
}

pub async fn update(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(session_id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> AppResult<Json<ApiResponse<Vec<ChatMessage>>>> {
    path_id(&session_id)?;
    respond(messages::update_messages(state.store.as_ref(), user_id, body.messages).await)
}

pub async fn delete(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(session_id): Path<String>,
    Json(body): Json<DeleteBody>,
) -> AppResult<Json<ApiResponse<usize>>> {
    let session_id = path_id(&session_id)?;
    respond(messages::delete_messages(state.store.as_ref(), user_id, session_id, &body.ids).await)
}

pub async fn consult(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    ClientScope(scope): ClientScope,
    Path(session_id): Path<String>,
    Json(body): Json<ConsultBody>,
) -> AppResult<Json<ApiResponse<ConsultReply>>> {
    let request = ConsultRequest {
        session_id: path_id(&session_id)?,
        content: body.content,
        target_id: body.target_id,
    };
    respond(messages::send_consult(&state, user_id, &request, &scope).await)
}

pub async fn feedback(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path((session_id, message_id)): Path<(String, String)>,
    Json(body): Json<FeedbackBody>,
) -> AppResult<Json<ApiResponse<ChatMessage>>> {
    let (session_id, message_id) = (path_id(&session_id)?, path_id(&message_id)?);
    let attitude = body.attitude.trim();
    respond(
        messages::feedback_message(state.store.as_ref(), user_id, session_id, message_id, attitude)
            .await,
    )
}

pub async fn translate(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    ClientScope(scope): ClientScope,
    Path((session_id, message_id)): Path<(String, String)>,
) -> AppResult<Json<ApiResponse<Translation>>> {
    let (session_id, message_id) = (path_id(&session_id)?, path_id(&message_id)?);
    respond(messages::translate_message(&state, user_id, session_id, message_id, &scope).await)
}
