// service/job_service.rs
use std::{collections::BTreeSet, sync::Arc};

use uuid::Uuid;

use crate::{
    db::Store,
    models::jobmodel::*,
    rules::job::{check_job_deletable, check_job_transition},
    service::{error::ServiceError, notification_service::NotificationService},
};

/// Search parameters as callers express them; the location is widened to
/// its whole subtree before querying.
#[derive(Debug, Clone, Default)]
pub struct JobSearch {
    pub status: Option<JobStatus>,
    pub owner_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    pub page: u32,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct JobService {
    db_client: Arc<dyn Store>,
    notification_service: Arc<NotificationService>,
}

impl JobService {
    pub fn new(db_client: Arc<dyn Store>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            db_client,
            notification_service,
        }
    }

    async fn load(&self, job_id: Uuid) -> Result<Job, ServiceError> {
        self.db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))
    }

    pub async fn create_job(&self, mut new_job: NewJob) -> Result<Job, ServiceError> {
        if let Some(location_id) = new_job.location_id {
            let found = self.db_client.get_existing_location_ids(&[location_id]).await?;
            if found.is_empty() {
                return Err(ServiceError::ReferenceNotFound(format!("Location {}", location_id)));
            }
        }

        let service_ids: BTreeSet<Uuid> = new_job.service_ids.iter().copied().collect();
        new_job.service_ids = service_ids.into_iter().collect();
        if !new_job.service_ids.is_empty() {
            let found = self.db_client.get_existing_service_ids(&new_job.service_ids).await?;
            if let Some(missing) = new_job.service_ids.iter().find(|id| !found.contains(id)) {
                return Err(ServiceError::ReferenceNotFound(format!("Service {}", missing)));
            }
        }

        let job = self.db_client.create_job(new_job).await?;
        tracing::info!("job {} created by {}", job.id, job.owner_id);

        self.notification_service.dispatch_job_created(job.clone());

        Ok(job)
    }

    pub async fn get_job(&self, job_id: Uuid) -> Result<JobDetails, ServiceError> {
        let job = self.load(job_id).await?;
        let service_ids = self.db_client.get_job_service_ids(job_id).await?;
        Ok(JobDetails { job, service_ids })
    }

    pub async fn search_jobs(&self, search: JobSearch) -> Result<Vec<Job>, ServiceError> {
        let location_ids = match search.location_id {
            Some(location_id) => {
                let ids = self.db_client.get_location_subtree_ids(location_id).await?;
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                Some(ids)
            }
            None => None,
        };

        let limit = search.limit as i64;
        let filter = JobFilter {
            status: search.status,
            owner_id: search.owner_id,
            location_ids,
            service_id: search.service_id,
            limit,
            offset: (search.page.max(1) - 1) as i64 * limit,
        };

        Ok(self.db_client.get_jobs(&filter).await?)
    }

    pub async fn update_job_status(
        &self,
        actor_id: Uuid,
        job_id: Uuid,
        target: JobStatus,
    ) -> Result<Job, ServiceError> {
        let job = self.load(job_id).await?;
        check_job_transition(&job, actor_id, target)?;

        let updated = self
            .db_client
            .update_job_status(job_id, job.status, target)
            .await?
            .ok_or_else(|| ServiceError::Conflict("Job status changed in the meantime".to_string()))?;

        tracing::info!(
            "job {} moved from {} to {}",
            job_id,
            job.status.to_str(),
            target.to_str()
        );

        Ok(updated)
    }

    pub async fn delete_job(&self, actor_id: Uuid, job_id: Uuid) -> Result<(), ServiceError> {
        let job = self.load(job_id).await?;
        check_job_deletable(&job, actor_id)?;

        if !self.db_client.soft_delete_job(job_id, JobStatus::Pending).await? {
            return Err(ServiceError::Conflict("Job status changed in the meantime".to_string()));
        }

        tracing::info!("job {} deleted", job_id);
        Ok(())
    }
}
