// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use crate::ai::CompletionProvider;
use crate::idgen::IdSource;
use crate::store::ChatStore;

/// Process-wide collaborators, built once by the binary and shared with
/// every request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ChatStore>,
    pub ids: Arc<dyn IdSource>,
    pub ai: Arc<dyn CompletionProvider>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ChatStore>,
        ids: Arc<dyn IdSource>,
        ai: Arc<dyn CompletionProvider>,
    ) -> Self {
        Self { store, ids, ai }
    }
}
