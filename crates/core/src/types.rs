/// Users are identified by the auth provider's UUID.
pub type UserId = uuid::Uuid;

/// All event timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
