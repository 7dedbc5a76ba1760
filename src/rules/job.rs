use uuid::Uuid;

use super::RuleError;
use crate::models::jobmodel::{Job, JobStatus};

/// Lifecycle moves a caller may request directly. IN_PROGRESS is only ever
/// reached through application acceptance.
pub fn check_job_transition(job: &Job, actor_id: Uuid, target: JobStatus) -> Result<(), RuleError> {
    let is_owner = actor_id == job.owner_id;
    let is_worker = Some(actor_id) == job.worker_id;

    match (job.status, target) {
        (JobStatus::Pending, JobStatus::Canceled) if is_owner => Ok(()),
        (JobStatus::InProgress, JobStatus::OnConfirmation) if is_worker => Ok(()),
        (JobStatus::InProgress | JobStatus::OnConfirmation, JobStatus::Completed) if is_owner => Ok(()),
        (_, JobStatus::Pending | JobStatus::InProgress) => {
            Err(RuleError::Forbidden("Job status cannot be set directly"))
        }
        _ if !is_owner && !is_worker => Err(RuleError::Forbidden("You are not a party to this job")),
        _ => Err(RuleError::Forbidden("Job status transition is not allowed")),
    }
}

pub fn check_job_deletable(job: &Job, actor_id: Uuid) -> Result<(), RuleError> {
    if job.owner_id != actor_id {
        return Err(RuleError::Forbidden("Only the job owner can delete it"));
    }
    if job.status != JobStatus::Pending {
        return Err(RuleError::Forbidden("Only pending jobs can be deleted"));
    }
    Ok(())
}
