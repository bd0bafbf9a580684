//! Server → client event payloads.
//!
//! These are delivered over live WebSocket connections and (in their push
//! form) over the web-push channel. Field names are part of the wire
//! contract with the client, hence the explicit renames.

use serde::{Deserialize, Serialize};

use crate::types::{GroupId, UserId};

/// Minimal invalidation marker: "this group changed, re-fetch it".
///
/// Sent when the full diff is not worth serializing; the client reacts by
/// re-reading the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupChanged {
    pub group: GroupRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRef {
    #[serde(rename = "groupID")]
    pub group_id: GroupId,
}

impl GroupChanged {
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group: GroupRef { group_id },
        }
    }
}

/// A user profile changed; sent to every group the user belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserChanged {
    pub user: UserRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    #[serde(rename = "userID")]
    pub user_id: UserId,
}

impl UserChanged {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user: UserRef { user_id },
        }
    }
}

/// A chat message, as delivered to live connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceived {
    pub message: MessageReceivedBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReceivedBody {
    #[serde(rename = "groupID")]
    pub group_id: GroupId,
    pub timestamp: u64,
    pub sender: UserId,
    pub content: String,
}

/// A chat message, as delivered over web push. Carries display names
/// instead of ids so the service worker can render a notification without
/// a round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePushed {
    pub message: MessagePushedBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePushedBody {
    pub group: String,
    pub timestamp: u64,
    pub sender: String,
    pub content: String,
}

/// An activity is about to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityReminder {
    pub activity: ActivityReminderBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityReminderBody {
    #[serde(rename = "groupID")]
    pub group_id: GroupId,
    pub activity_id: u64,
    pub title: String,
    pub date: String,
    pub start: String,
}
