// Copyright (c) Coach Team
// SPDX-License-Identifier: Apache-2.0

//! Read and write paths of the chat message log.

pub mod assembly;
pub mod batch;
pub mod consult;
pub mod context;
pub mod translate;

use serde::Serialize;

use crate::models::ChatMessage;

pub use assembly::{list_messages, ListFilter, ListRequest, MessagePage, DEFAULT_PAGE_SIZE};
pub use batch::{create_messages, delete_messages, feedback_message, update_messages, MessagePatch};
pub use consult::{send_consult, ConsultReply, ConsultRequest};
pub use translate::{translate_message, Translation};

/// A listed message with its newest translation attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: ChatMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate_content: Option<String>,
}
