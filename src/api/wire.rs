//! Request and response bodies of the backend's JSON endpoints.

use crate::model::{ProcessingStatus, ProductUpdate, SessionId, TagUpdate, TransactionId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(super) struct UsernameRequest<'a> {
    pub(super) username: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CreateSessionResponse {
    pub(super) session_id: SessionId,
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckUsernameResponse {
    pub(super) exists: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionRequest<'a> {
    pub(super) session_id: &'a SessionId,
}

/// Used by both the sample statement trigger and the AI toggle.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct EnableAiRequest<'a> {
    pub(super) session_id: &'a SessionId,
    #[serde(rename = "enableAI")]
    pub(super) enable_ai: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProcessingResponse {
    pub(super) status: ProcessingStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateTagRequest<'a> {
    pub(super) session_id: &'a SessionId,
    pub(super) transaction_id: serde_json::Value,
    pub(super) new_tag: &'a str,
    pub(super) apply_to_all: bool,
    pub(super) product: &'a str,
}

impl<'a> UpdateTagRequest<'a> {
    pub(super) fn new(session_id: &'a SessionId, update: &'a TagUpdate) -> Self {
        Self {
            session_id,
            transaction_id: id_value(&update.transaction_id),
            new_tag: &update.new_tag,
            apply_to_all: update.apply_to_all,
            product: &update.product,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UpdateProductRequest<'a> {
    pub(super) session_id: &'a SessionId,
    pub(super) transaction_id: serde_json::Value,
    pub(super) old_product: &'a str,
    pub(super) new_product: &'a str,
    pub(super) replace_all: bool,
    pub(super) tag: &'a str,
}

impl<'a> UpdateProductRequest<'a> {
    pub(super) fn new(session_id: &'a SessionId, update: &'a ProductUpdate) -> Self {
        Self {
            session_id,
            transaction_id: id_value(&update.transaction_id),
            old_product: &update.old_product,
            new_product: &update.new_product,
            replace_all: update.replace_all,
            tag: &update.tag,
        }
    }
}

/// The body the backend sends with a non-success status.
#[derive(Debug, Default, Deserialize)]
pub(super) struct ErrorBody {
    #[serde(default)]
    pub(super) error: Option<String>,
    #[serde(default)]
    pub(super) message: Option<String>,
}

impl ErrorBody {
    pub(super) fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}

/// Transaction ids are sent back the way they arrived: integers as JSON numbers, anything else as
/// a string.
fn id_value(id: &TransactionId) -> serde_json::Value {
    match id.as_str().parse::<i64>() {
        Ok(n) => serde_json::Value::from(n),
        Err(_) => serde_json::Value::from(id.as_str()),
    }
}
