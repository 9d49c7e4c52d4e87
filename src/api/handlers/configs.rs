// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use axum::{extract::State, Json};
use std::collections::BTreeMap;

use crate::api::routes::{respond, ApiResponse, ClientScope};
use crate::domain::appconfig::list_values;
use crate::error::AppResult;
use crate::state::AppState;

/// Every config key resolved for the calling client version
pub async fn get_configs(
    State(state): State<AppState>,
    ClientScope(scope): ClientScope,
) -> AppResult<Json<ApiResponse<BTreeMap<String, String>>>> {
    respond(list_values(state.store.as_ref(), &scope).await)
}
