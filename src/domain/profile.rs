// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use super::appconfig::ConfigScope;
use super::demo::seed_demo_data;
use crate::error::{AppError, AppResult};
use crate::idgen::IdSource;
use crate::models::chat_message::TAG_DEMO;
use crate::models::ids::parse_id;
use crate::models::profile::is_valid_gender;
use crate::models::user_file::USAGE_TYPE_AVATAR;
use crate::models::{Profile, UpdateProfile};
use crate::store::{ChatStore, ProfileQuery};

const DEFAULT_PAGE_SIZE: i64 = 20;

/// One page of the caller's friend profiles
#[derive(Debug, Clone, Default)]
pub struct ProfileListRequest {
    /// Matched as a substring of `name` or `im_name`
    pub search_name: String,
    /// Largest id already returned; empty for the first page
    pub page_token: String,
    pub page_size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePage {
    pub profiles: Vec<Profile>,
    /// Set only when the page was full
    pub next_page_token: Option<String>,
}

fn check_gender(gender: &str) -> AppResult<()> {
    if is_valid_gender(gender) {
        Ok(())
    } else {
        Err(AppError::invalid(format!("gender must be 'male' or 'female', got: {gender}")))
    }
}

/// Replaces the cached avatar with the linked file's URL. A missing file
/// keeps the cached value.
async fn resolve_avatar(store: &dyn ChatStore, profile: &mut Profile) {
    let Some(file_id) = profile.avatar_file_id.filter(|id| *id > 0) else {
        return;
    };
    match store.get_user_file(profile.user_id, file_id).await {
        Ok(file) => profile.avatar = file.public_url,
        Err(e) => warn!(
            "Failed to resolve avatar file {} of profile {}: {}",
            file_id, profile.id, e
        ),
    }
}

pub async fn get_profile(
    store: &dyn ChatStore,
    user_id: i64,
    profile_id: i64,
) -> AppResult<Profile> {
    let mut profile = store.get_profile(user_id, profile_id).await?;
    resolve_avatar(store, &mut profile).await;
    Ok(profile)
}

/// Lists the caller's profiles in id order, `page_size` (default 20) at a
/// time.
pub async fn list_profiles(
    store: &dyn ChatStore,
    user_id: i64,
    request: &ProfileListRequest,
) -> AppResult<ProfilePage> {
    let limit = if request.page_size <= 0 { DEFAULT_PAGE_SIZE } else { request.page_size };
    let query = ProfileQuery {
        user_id,
        search: request.search_name.trim().to_string(),
        after_id: parse_id(&request.page_token),
        limit,
    };
    let mut profiles = store.list_profiles(&query).await?;
    for profile in &mut profiles {
        resolve_avatar(store, profile).await;
    }

    let next_page_token = if profiles.len() as i64 == limit {
        profiles.last().map(|p| p.id.to_string())
    } else {
        None
    };
    Ok(ProfilePage { profiles, next_page_token })
}

/// Stores a new friend profile owned by the caller.
pub async fn create_profile(
    store: &dyn ChatStore,
    ids: &dyn IdSource,
    user_id: i64,
    friend: Profile,
) -> AppResult<Profile> {
    check_gender(&friend.gender)?;

    let now = Utc::now();
    let profile = Profile {
        id: ids.next_id(),
        user_id,
        created_at: now,
        updated_at: now,
        ..friend
    };
    let profile = store.create_profile(profile).await?;
    info!(user_id, profile_id = profile.id, "Created profile");
    Ok(profile)
}

/// Deletes one of the caller's friend profiles. The caller's own root
/// profile cannot be deleted.
pub async fn delete_profile(store: &dyn ChatStore, user_id: i64, profile_id: i64) -> AppResult<()> {
    let user = store.get_user(user_id).await?;
    if user.profile_id == Some(profile_id) {
        return Err(AppError::invalid("the account's own profile cannot be deleted"));
    }
    store.delete_profile(user_id, profile_id).await?;
    info!(user_id, profile_id, "Deleted profile");
    Ok(())
}

/// Applies `changes` to one of the caller's profiles. Blank values (empty
/// strings, a non-positive age, an empty attribute list) are ignored.
///
/// An `avatar_file_id` must name a file the caller owns; the profile then
/// caches that file's public URL. Once a gender is supplied, a user without
/// demo conversations gets them seeded. Seeding failures are logged and do
/// not fail the update.
pub async fn update_profile(
    store: &dyn ChatStore,
    ids: &dyn IdSource,
    user_id: i64,
    profile_id: i64,
    changes: UpdateProfile,
    scope: &ConfigScope,
) -> AppResult<Profile> {
    let mut changes = changes.without_blanks();
    if let Some(gender) = &changes.gender {
        check_gender(gender)?;
    }

    if let Some(file_id) = changes.avatar_file_id {
        let file = store.get_user_file(user_id, file_id).await?;
        if file.usage_type != USAGE_TYPE_AVATAR {
            if let Err(e) = store.set_file_usage(file.id, USAGE_TYPE_AVATAR).await {
                warn!("Failed to mark file {} as avatar: {}", file.id, e);
            }
        }
        changes.avatar = Some(file.public_url);
    }

    if changes.is_empty() {
        return get_profile(store, user_id, profile_id).await;
    }

    let supplies_gender = changes.gender.is_some();
    let profile = store.update_profile(user_id, profile_id, changes).await?;

    if supplies_gender {
        seed_if_missing(store, ids, user_id, &profile, scope).await;
    }
    Ok(profile)
}

async fn seed_if_missing(
    store: &dyn ChatStore,
    ids: &dyn IdSource,
    user_id: i64,
    profile: &Profile,
    scope: &ConfigScope,
) {
    // cheap pre-check; the insert re-checks under a per-user lock
    match store.has_tagged_message(user_id, TAG_DEMO).await {
        Ok(true) => {}
        Ok(false) => {
            let user = match store.get_user(user_id).await {
                Ok(user) => user,
                Err(e) => {
                    error!("Failed to load user {} for demo seeding: {}", user_id, e);
                    return;
                }
            };
            if let Err(e) = seed_demo_data(store, ids, &user, profile, scope).await {
                error!(
                    "Failed to copy demo data for user {} (gender {}): {:?}",
                    user_id, profile.gender, e
                );
            }
        }
        Err(e) => error!("Failed to check demo messages for user {}: {}", user_id, e),
    }
}
