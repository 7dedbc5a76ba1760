use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::usermodel::RecordState;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    #[serde(skip_serializing)]
    pub record_state: RecordState,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    #[serde(skip_serializing)]
    pub record_state: RecordState,
}

/// One row of `user_locations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct LocationMembership {
    pub user_id: Uuid,
    pub location_id: Uuid,
}
