// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::api::routes::{respond, ApiResponse, Caller, ClientScope};
use crate::domain::profile::{
    create_profile, delete_profile, get_profile, list_profiles, update_profile,
    ProfileListRequest, ProfilePage,
};
use crate::error::{AppError, AppResult};
use crate::models::ids::{self, parse_id};
use crate::models::{Profile, Properties, UpdateProfile};
use crate::state::AppState;

/// Query string of a profile listing
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub search_name: String,
    pub page_token: String,
    pub page_size: i64,
}

/// A new friend profile, also the body of a session creation
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewProfileBody {
    pub name: String,
    pub im_name: String,
    pub avatar: String,
    pub gender: String,
    pub age: i32,
    #[serde(rename = "desc")]
    pub intro: String,
    pub custom: Properties,
}

impl From<NewProfileBody> for Profile {
    fn from(body: NewProfileBody) -> Self {
        Profile {
            name: body.name,
            im_name: body.im_name,
            avatar: body.avatar,
            gender: body.gender,
            age: body.age,
            intro: body.intro,
            custom: body.custom,
            ..Default::default()
        }
    }
}

/// Profile fields a client may change; absent fields stay untouched
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileBody {
    pub name: Option<String>,
    pub im_name: Option<String>,
    pub avatar: Option<String>,
    #[serde(with = "ids::opt_id")]
    pub avatar_file_id: Option<i64>,
    pub gender: Option<String>,
    pub age: Option<i32>,
    #[serde(rename = "desc")]
    pub intro: Option<String>,
    pub custom: Option<Properties>,
}

impl From<ProfileBody> for UpdateProfile {
    fn from(body: ProfileBody) -> Self {
        UpdateProfile {
            name: body.name,
            im_name: body.im_name,
            avatar: body.avatar,
            avatar_file_id: body.avatar_file_id,
            gender: body.gender,
            age: body.age,
            intro: body.intro,
            custom: body.custom,
        }
    }
}

pub(crate) fn path_id(raw: &str) -> AppResult<i64> {
    parse_id(raw).ok_or_else(|| AppError::invalid(format!("invalid id: {raw}")))
}

pub async fn list(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Query(params): Query<ListParams>,
) -> AppResult<Json<ApiResponse<ProfilePage>>> {
    let request = ProfileListRequest {
        search_name: params.search_name,
        page_token: params.page_token,
        page_size: params.page_size,
    };
    respond(list_profiles(state.store.as_ref(), user_id, &request).await)
}

pub async fn create(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(body): Json<NewProfileBody>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let ids = state.ids.as_ref();
    respond(create_profile(state.store.as_ref(), ids, user_id, body.into()).await)
}

pub async fn get_one(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let id = path_id(&id)?;
    respond(get_profile(state.store.as_ref(), user_id, id).await)
}

pub async fn patch_one(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    ClientScope(scope): ClientScope,
    Path(id): Path<String>,
    Json(body): Json<ProfileBody>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let id = path_id(&id)?;
    let (store, ids) = (state.store.as_ref(), state.ids.as_ref());
    respond(update_profile(store, ids, user_id, id, body.into(), &scope).await)
}

pub async fn delete_one(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<()>>> {
    let id = path_id(&id)?;
    respond(delete_profile(state.store.as_ref(), user_id, id).await)
}
