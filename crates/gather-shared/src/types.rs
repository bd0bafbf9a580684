use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque 64-bit user identity.
pub type UserId = u64;

/// Opaque 64-bit group identity.
pub type GroupId = u64;

/// Identifies one live bidirectional channel to one client.
///
/// Distinct from the user identity it is currently associated with: a user
/// may hold several connections (one per tab), and a connection id is never
/// reused once closed. Stored as a string so that identifiers minted by an
/// external gateway can be carried unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A registered user.
///
/// `version` strictly increases on every committed mutation; `connections`
/// never exceeds [`crate::constants::USER_MAX_CONNECTIONS`] entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub groups: Vec<GroupId>,
    #[serde(default)]
    pub connections: Vec<ConnectionId>,
    #[serde(default)]
    pub push_subscriptions: Vec<PushSubscription>,
    #[serde(default)]
    pub version: u64,
}

impl User {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}

/// A group: roster plus the shared state its members coordinate on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Group {
    pub group_id: GroupId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub calendar_mode: String,
    #[serde(default)]
    pub members: Vec<UserId>,
    #[serde(default)]
    pub poll: Option<Poll>,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub availabilities: Vec<Availability>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub version: u64,
}

impl Group {
    pub fn is_member(&self, user_id: UserId) -> bool {
        self.members.contains(&user_id)
    }

    pub fn activity(&self, activity_id: u64) -> Option<&Activity> {
        self.activities.iter().find(|a| a.activity_id == activity_id)
    }

    pub fn task(&self, task_id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn availability(&self, availability_id: u64) -> Option<&Availability> {
        self.availabilities
            .iter()
            .find(|a| a.availability_id == availability_id)
    }
}

/// At most one poll is active per group at a time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Poll {
    pub title: String,
    /// Creation time, unix milliseconds.
    pub timestamp: u64,
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollOption {
    pub name: String,
    #[serde(default)]
    pub votes: Vec<UserId>,
}

/// A planned activity members can confirm attendance for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Activity {
    pub activity_id: u64,
    pub title: String,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM`.
    pub start: String,
    /// `HH:MM`.
    pub end: String,
    #[serde(default)]
    pub confirmed: Vec<UserId>,
}

/// A member's stated availability window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Availability {
    pub availability_id: u64,
    pub user_id: UserId,
    pub date: String,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    pub task_id: u64,
    pub title: String,
    pub assignee: UserId,
    #[serde(default)]
    pub completed: bool,
}

/// One chat message. Identified by (group, timestamp); immutable once
/// written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Message {
    pub group_id: GroupId,
    /// Unix milliseconds; the range key for chat history queries.
    pub timestamp: u64,
    pub sender: UserId,
    pub content: String,
}

/// A browser push subscription, in the shape the Push API hands to the
/// client (`PushSubscription.toJSON()`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscription {
    pub endpoint: String,
    #[serde(default)]
    pub keys: PushSubscriptionKeys,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushSubscriptionKeys {
    #[serde(default)]
    pub p256dh: String,
    #[serde(default)]
    pub auth: String,
}

/// Current unix time in milliseconds.
pub fn unix_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
