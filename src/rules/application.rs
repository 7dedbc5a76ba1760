use uuid::Uuid;

use super::RuleError;
use crate::models::jobmodel::{Application, ApplicationStatus, ApplicationType, Job, JobStatus};

/// What the repository needs to perform an acceptance atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptancePlan {
    pub job_id: Uuid,
    pub application_id: Uuid,
    pub worker_id: Uuid,
}

/// The party allowed to accept or reject an application.
pub fn resolver_of(application_type: ApplicationType, job: &Job, worker_id: Uuid) -> Uuid {
    match application_type {
        ApplicationType::Apply => job.owner_id,
        ApplicationType::Invite => worker_id,
    }
}

/// The party that created the application.
pub fn initiator_of(application_type: ApplicationType, job: &Job, worker_id: Uuid) -> Uuid {
    match application_type {
        ApplicationType::Apply => worker_id,
        ApplicationType::Invite => job.owner_id,
    }
}

pub fn authorize_create(
    application_type: ApplicationType,
    job: &Job,
    actor_id: Uuid,
    worker_id: Uuid,
) -> Result<(), RuleError> {
    match application_type {
        ApplicationType::Invite => {
            if actor_id != job.owner_id {
                return Err(RuleError::Forbidden("Only the job owner can invite workers"));
            }
            if worker_id == job.owner_id {
                return Err(RuleError::Forbidden("You cannot invite yourself to your own job"));
            }
        }
        ApplicationType::Apply => {
            if actor_id != worker_id {
                return Err(RuleError::Forbidden("You can only apply on your own behalf"));
            }
            if worker_id == job.owner_id {
                return Err(RuleError::Forbidden("You cannot apply to your own job"));
            }
        }
    }

    if job.status != JobStatus::Pending {
        return Err(RuleError::Conflict("Job is no longer accepting applications"));
    }

    Ok(())
}

pub fn authorize_resolution(application: &Application, job: &Job, actor_id: Uuid) -> Result<(), RuleError> {
    let resolver = resolver_of(application.application_type, job, application.worker_id);
    if resolver != actor_id {
        return Err(RuleError::Forbidden("You are not allowed to resolve this application"));
    }
    Ok(())
}

/// Only PENDING -> {ACCEPTED, REJECTED}. Nothing leaves ACCEPTED or REJECTED.
pub fn check_transition(from: ApplicationStatus, to: ApplicationStatus) -> Result<(), RuleError> {
    match (from, to) {
        (_, ApplicationStatus::Pending) => Err(RuleError::Validation(
            "Application status can only be set to ACCEPTED or REJECTED".to_string(),
        )),
        (ApplicationStatus::Pending, _) => Ok(()),
        (_, ApplicationStatus::Accepted) => Err(RuleError::Conflict("Application is already resolved")),
        (_, ApplicationStatus::Rejected) => Err(RuleError::Forbidden("Application is already resolved")),
    }
}

pub fn plan_acceptance(application: &Application, job: &Job) -> Result<AcceptancePlan, RuleError> {
    check_transition(application.status, ApplicationStatus::Accepted)?;

    if job.status != JobStatus::Pending || job.worker_id.is_some() {
        return Err(RuleError::Conflict("Job already has an accepted worker"));
    }

    Ok(AcceptancePlan {
        job_id: job.id,
        application_id: application.id,
        worker_id: application.worker_id,
    })
}

/// Ids of the pending siblings that lose once `accepted_id` wins.
pub fn resolve_competitors(accepted_id: Uuid, job_id: Uuid, siblings: &[Application]) -> Vec<Uuid> {
    siblings
        .iter()
        .filter(|a| a.job_id == job_id && a.id != accepted_id)
        .filter(|a| a.status == ApplicationStatus::Pending)
        .map(|a| a.id)
        .collect()
}
