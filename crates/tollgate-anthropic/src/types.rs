// SPDX-FileCopyrightText: 2026 Tollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire shapes for the Messages API. Only the fields tier dispatch reads
//! are modelled; unknown response fields are ignored.

use serde::{Deserialize, Serialize};

/// Non-streaming, single-turn request body.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    /// Model id mapped from the requested cloud tier.
    pub model: String,

    pub messages: Vec<ApiMessage>,

    pub max_tokens: u32,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    pub role: String,

    pub content: String,
}

/// Successful Messages API reply.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub content: Vec<ResponseContentBlock>,
    /// Model that actually served the request.
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: ApiUsage,
}

impl MessageResponse {
    /// Concatenated text of every text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Other => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    /// Tool use, thinking and any block type added later.
    #[serde(other)]
    Other,
}

/// Billed token counts.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Error envelope returned with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    /// Error type identifier, e.g. `overloaded_error`.
    #[serde(rename = "type")]
    pub type_: String,
    pub message: String,
}
