use uuid::Uuid;

use super::RuleError;
use crate::models::jobmodel::{Job, JobStatus};

pub const MINIMUM_RATE: i32 = 1;
pub const MAXIMUM_RATE: i32 = 5;

pub fn validate_rate(rate: i32) -> Result<(), RuleError> {
    if !(MINIMUM_RATE..=MAXIMUM_RATE).contains(&rate) {
        return Err(RuleError::Validation(format!(
            "Rate must be between {} and {}",
            MINIMUM_RATE, MAXIMUM_RATE
        )));
    }
    Ok(())
}

/// The other party of the job, seen from `giver_id`.
pub fn counterpart(job: &Job, giver_id: Uuid) -> Result<Uuid, RuleError> {
    if giver_id == job.owner_id {
        return job
            .worker_id
            .ok_or(RuleError::Forbidden("Job has no worker to rate yet"));
    }
    if Some(giver_id) == job.worker_id {
        return Ok(job.owner_id);
    }
    Err(RuleError::Forbidden("Only the job owner or its worker can rate this job"))
}

pub fn check_rateable(job: &Job) -> Result<(), RuleError> {
    match job.status {
        JobStatus::InProgress | JobStatus::OnConfirmation | JobStatus::Completed => Ok(()),
        JobStatus::Pending | JobStatus::Canceled => {
            Err(RuleError::Forbidden("Job cannot be rated in its current status"))
        }
    }
}

/// An owner rating an unfinished job closes it.
pub fn completes_job(job: &Job, giver_id: Uuid) -> bool {
    giver_id == job.owner_id
        && matches!(job.status, JobStatus::InProgress | JobStatus::OnConfirmation)
}

/// Mean of `rates`, or `None` when there is nothing to average.
pub fn average(rates: &[i32]) -> Option<f64> {
    if rates.is_empty() {
        return None;
    }
    let sum: i64 = rates.iter().map(|r| i64::from(*r)).sum();
    Some(sum as f64 / rates.len() as f64)
}

/// Folds one more rate into an average over `count` previous rates.
pub fn running_average(previous: f64, count: u64, new_rate: i32) -> f64 {
    let total = previous * count as f64 + f64::from(new_rate);
    total / (count + 1) as f64
}
