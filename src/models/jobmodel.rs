use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;

use super::usermodel::RecordState;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    InProgress,
    OnConfirmation,
    Completed,
    Canceled,
}

impl JobStatus {
    pub fn to_str(&self) -> &str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::OnConfirmation => "on_confirmation",
            JobStatus::Completed => "completed",
            JobStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "application_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationType {
    /// The owner invites a worker; the worker resolves it.
    Invite,
    /// A worker applies; the owner resolves it.
    Apply,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub fn to_str(&self) -> &str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub worker_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub cost: BigDecimal,
    pub address: Option<String>,
    pub location_id: Option<Uuid>,
    pub status: JobStatus,
    #[serde(skip_serializing)]
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: Uuid,
    pub job_id: Uuid,
    pub worker_id: Uuid,
    #[serde(rename = "type")]
    pub application_type: ApplicationType,
    pub status: ApplicationStatus,
    #[serde(skip_serializing)]
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything written by one successful acceptance.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptanceOutcome {
    pub application: Application,
    pub job: Job,
    pub rejected: Vec<Application>,
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub owner_id: Option<Uuid>,
    pub location_ids: Option<Vec<Uuid>>,
    pub service_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

/// Insert payload for `jobs` plus its service memberships.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub owner_id: Uuid,
    pub title: String,
    pub description: String,
    pub cost: BigDecimal,
    pub address: Option<String>,
    pub location_id: Option<Uuid>,
    pub service_ids: Vec<Uuid>,
}

/// A job together with the services it is filed under.
#[derive(Debug, Clone, Serialize)]
pub struct JobDetails {
    #[serde(flatten)]
    pub job: Job,
    pub service_ids: Vec<Uuid>,
}
