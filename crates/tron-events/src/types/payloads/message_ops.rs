//! Message mutation event payloads: `message.deleted`.

use serde::{Deserialize, Serialize};

/// Payload for `message.deleted` events (soft delete).
///
/// Reconstruction extends the deletion to the whole turn the target message
/// started — see `reconstruct_from_events`'s deletion pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDeletedPayload {
    /// ID of the event being soft-deleted.
    pub target_event_id: String,
    /// Why the message was deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
