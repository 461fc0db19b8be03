//! Identity types for IncentEdge entities

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Organization id: the tenant boundary for every read and write.
pub type OrgId = Uuid;

pub type ApplicationId = Uuid;
pub type ProgramId = Uuid;
pub type ProjectId = Uuid;
pub type TaskId = Uuid;
pub type CommentId = Uuid;
pub type UserId = Uuid;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}
