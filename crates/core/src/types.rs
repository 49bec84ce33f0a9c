/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Video identifiers are the host platform's opaque string ids.
pub type VideoId = String;

/// Channel identifiers are the host platform's opaque string ids.
pub type ChannelId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
