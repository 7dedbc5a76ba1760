use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::usermodel::RecordState;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rate {
    pub id: Uuid,
    pub job_id: Uuid,
    pub gives_id: Uuid,
    pub receiver_id: Uuid,
    pub rate: i32,
    pub review: Option<String>,
    #[serde(skip_serializing)]
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
}

/// Validated input for the rate transaction.
#[derive(Debug, Clone)]
pub struct NewRate {
    pub job_id: Uuid,
    pub gives_id: Uuid,
    pub receiver_id: Uuid,
    pub rate: i32,
    pub review: Option<String>,
    /// Close the job as completed inside the same transaction.
    pub complete_job: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq)]
pub struct RecomputeSummary {
    pub users_scanned: u64,
    pub users_updated: u64,
}
