// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::idgen::IdSource;
use crate::metrics;
use crate::models::{Profile, User};
use crate::store::ChatStore;

/// Login details supplied by the identity provider
#[derive(Debug, Clone, Default)]
pub struct LoginIdentity {
    pub external_id: String,
    pub phone: String,
    pub name: String,
    pub im_name: String,
    pub avatar: String,
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Returns the user owning `login`'s external id or phone, registering a new
/// user with a root profile when neither is known.
///
/// Lookup and registration run in one transaction that serializes
/// concurrent logins for the same identity, so an identity never ends up
/// with two users.
pub async fn find_or_register(
    store: &dyn ChatStore,
    ids: &dyn IdSource,
    login: &LoginIdentity,
) -> AppResult<User> {
    let external_id = non_empty(&login.external_id);
    let phone = non_empty(&login.phone);
    if external_id.is_none() && phone.is_none() {
        return Err(AppError::ParamMissing);
    }

    let now = Utc::now();
    let user = User {
        id: ids.next_id(),
        name: login.name.clone(),
        im_name: login.im_name.clone(),
        external_id,
        phone,
        avatar: login.avatar.clone(),
        profile_id: None,
        created_at: now,
        updated_at: now,
    };
    let profile = Profile {
        id: ids.next_id(),
        user_id: user.id,
        name: login.name.clone(),
        im_name: login.im_name.clone(),
        created_at: now,
        updated_at: now,
        ..Default::default()
    };

    let result = AssertUnwindSafe(store.find_or_create_user(user, profile))
        .catch_unwind()
        .await;

    match result {
        Ok(Ok((user, created))) => {
            if created {
                metrics::USERS_REGISTERED.inc();
                info!(user_id = user.id, profile_id = ?user.profile_id, "Registered new user");
            }
            Ok(user)
        }
        Ok(Err(e)) => {
            error!(
                "Failed to find or register user (external_id {:?}, phone {:?}): {}",
                login.external_id, login.phone, e
            );
            Err(AppError::internal(e))
        }
        Err(_) => {
            error!("Panic while resolving user (external_id {:?})", login.external_id);
            Err(AppError::internal("panic during user resolution"))
        }
    }
}
