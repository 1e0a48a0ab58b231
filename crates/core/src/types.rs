use uuid::Uuid;

/// All entity identifiers are UUIDv4, assigned at creation and never reused.
pub type ProjectId = Uuid;
pub type NodeId = Uuid;
pub type UserId = Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
