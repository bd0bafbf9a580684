/// Most live connections a single user may hold; opening another evicts
/// the oldest.
pub const USER_MAX_CONNECTIONS: usize = 8;

/// Read-transform-write attempts before an update gives up with
/// `TooManyRetries`.
pub const UPDATE_MAX_RETRIES: u32 = 16;

/// Messages returned per chat page.
pub const CHAT_PAGE_LIMIT: usize = 64;

/// Chat message length bounds (bytes).
pub const CHAT_MESSAGE_MIN_LEN: usize = 1;
pub const CHAT_MESSAGE_MAX_LEN: usize = 500;

/// Task title length bounds (bytes).
pub const TASK_TITLE_MIN_LEN: usize = 1;
pub const TASK_TITLE_MAX_LEN: usize = 50;

/// Most open tasks a group may accumulate.
pub const GROUP_MAX_TASKS: usize = 32;

/// User and group display name bounds (bytes).
pub const NAME_MIN_LEN: usize = 1;
pub const NAME_MAX_LEN: usize = 64;

/// User status string maximum length (bytes).
pub const STATUS_MAX_LEN: usize = 128;

/// Variable name under which the web-push signing keypair is persisted.
pub const VAPID_KEYPAIR_VARIABLE: &str = "vapid_keypair";
