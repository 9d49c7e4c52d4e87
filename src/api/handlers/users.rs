// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::routes::{respond, ApiResponse, Caller};
use crate::domain::new_user::{find_or_register, LoginIdentity};
use crate::error::AppResult;
use crate::models::{Profile, User};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
    pub external_id: String,
    pub phone: String,
    pub name: String,
    pub im_name: String,
    pub avatar: String,
}

impl From<LoginBody> for LoginIdentity {
    fn from(body: LoginBody) -> Self {
        LoginIdentity {
            external_id: body.external_id,
            phone: body.phone,
            name: body.name,
            im_name: body.im_name,
            avatar: body.avatar,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Me {
    pub user: User,
    pub profile: Option<Profile>,
}

/// Resolves the identity to a user, registering it on first sight
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> AppResult<Json<ApiResponse<User>>> {
    let identity = LoginIdentity::from(body);
    respond(find_or_register(state.store.as_ref(), state.ids.as_ref(), &identity).await)
}

pub async fn me(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> AppResult<Json<ApiResponse<Me>>> {
    let user = state.store.get_user(user_id).await?;
    let profile = match user.profile_id {
        Some(profile_id) => match state.store.get_profile(user_id, profile_id).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!("Root profile {} of user {} unavailable: {}", profile_id, user_id, e);
                None
            }
        },
        None => None,
    };
    respond(Ok(Me { user, profile }))
}
