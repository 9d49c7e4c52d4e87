// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

pub mod configs;
pub mod health;
pub mod messages;
pub mod profiles;
pub mod sessions;
pub mod users;
