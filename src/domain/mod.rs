// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

pub mod appconfig;
pub mod chat_session;
pub mod demo;
pub mod id_remap;
pub mod new_user;
pub mod profile;

pub use appconfig::ConfigScope;
