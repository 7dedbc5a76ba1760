// service/application_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::Store,
    models::jobmodel::*,
    rules::application::{authorize_create, authorize_resolution, check_transition, plan_acceptance},
    service::{error::ServiceError, notification_service::NotificationService},
};

#[derive(Debug, Clone)]
pub struct ApplicationService {
    db_client: Arc<dyn Store>,
    notification_service: Arc<NotificationService>,
}

impl ApplicationService {
    pub fn new(db_client: Arc<dyn Store>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            db_client,
            notification_service,
        }
    }

    async fn load(&self, application_id: Uuid) -> Result<(Application, Job), ServiceError> {
        let application = self
            .db_client
            .get_application(application_id)
            .await?
            .ok_or(ServiceError::ApplicationNotFound(application_id))?;

        let job = self
            .db_client
            .get_job(application.job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(application.job_id))?;

        Ok((application, job))
    }

    /// APPLY: `actor_id` applies to the job. INVITE: the owner invites `worker_id`.
    pub async fn create_application(
        &self,
        actor_id: Uuid,
        job_id: Uuid,
        worker_id: Option<Uuid>,
        application_type: ApplicationType,
    ) -> Result<Application, ServiceError> {
        let job = self
            .db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        let worker_id = match application_type {
            ApplicationType::Apply => worker_id.unwrap_or(actor_id),
            ApplicationType::Invite => {
                let worker_id = worker_id.ok_or_else(|| {
                    ServiceError::Validation("workerId is required for invitations".to_string())
                })?;
                self.db_client
                    .get_user(Some(worker_id), None, None)
                    .await?
                    .ok_or(ServiceError::UserNotFound(worker_id))?;
                worker_id
            }
        };

        authorize_create(application_type, &job, actor_id, worker_id)?;

        if self.db_client.get_pending_application(job_id, worker_id).await?.is_some() {
            return Err(ServiceError::Conflict(
                "A pending application already exists for this worker".to_string(),
            ));
        }

        let application = self
            .db_client
            .create_application(job_id, worker_id, application_type)
            .await?;

        tracing::info!(
            "application {} created for job {} (worker {})",
            application.id,
            job_id,
            worker_id
        );

        self.notification_service
            .dispatch_application_received(application.clone(), job);

        Ok(application)
    }

    /// Accepts one application, rejects the other pending ones and starts
    /// the job. Of two concurrent acceptances on the same job exactly one
    /// wins; the other gets `Conflict`.
    pub async fn accept_application(
        &self,
        actor_id: Uuid,
        application_id: Uuid,
    ) -> Result<AcceptanceOutcome, ServiceError> {
        let (application, job) = self.load(application_id).await?;

        authorize_resolution(&application, &job, actor_id)?;
        let plan = plan_acceptance(&application, &job)?;

        let outcome = self
            .db_client
            .accept_application(&plan)
            .await?
            .ok_or_else(|| ServiceError::Conflict("Job already has an accepted worker".to_string()))?;

        tracing::info!(
            "application {} accepted; job {} in progress, {} siblings rejected",
            application_id,
            job.id,
            outcome.rejected.len()
        );

        let mut resolved = vec![outcome.application.clone()];
        resolved.extend(outcome.rejected.iter().cloned());
        self.notification_service
            .dispatch_application_resolved(resolved, outcome.job.clone());

        Ok(outcome)
    }

    pub async fn reject_application(
        &self,
        actor_id: Uuid,
        application_id: Uuid,
    ) -> Result<Application, ServiceError> {
        let (application, job) = self.load(application_id).await?;

        authorize_resolution(&application, &job, actor_id)?;
        check_transition(application.status, ApplicationStatus::Rejected)?;

        let rejected = self
            .db_client
            .reject_application(application_id)
            .await?
            .ok_or_else(|| ServiceError::Forbidden("Application is already resolved".to_string()))?;

        tracing::info!("application {} rejected", application_id);

        self.notification_service
            .dispatch_application_resolved(vec![rejected.clone()], job);

        Ok(rejected)
    }

    pub async fn update_application_status(
        &self,
        actor_id: Uuid,
        application_id: Uuid,
        status: ApplicationStatus,
    ) -> Result<Application, ServiceError> {
        match status {
            ApplicationStatus::Accepted => self
                .accept_application(actor_id, application_id)
                .await
                .map(|outcome| outcome.application),
            ApplicationStatus::Rejected => self.reject_application(actor_id, application_id).await,
            ApplicationStatus::Pending => {
                let (application, _) = self.load(application_id).await?;
                check_transition(application.status, status)?;
                Ok(application)
            }
        }
    }

    /// Visible to the job owner and to the worker it concerns.
    pub async fn get_application(
        &self,
        actor_id: Uuid,
        application_id: Uuid,
    ) -> Result<Application, ServiceError> {
        let (application, job) = self.load(application_id).await?;

        if actor_id != job.owner_id && actor_id != application.worker_id {
            return Err(ServiceError::Forbidden(
                "You are not allowed to view this application".to_string(),
            ));
        }

        Ok(application)
    }

    /// The owner sees every application; anybody else only their own.
    pub async fn list_job_applications(
        &self,
        actor_id: Uuid,
        job_id: Uuid,
    ) -> Result<Vec<Application>, ServiceError> {
        let job = self
            .db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        let applications = self.db_client.get_job_applications(job_id).await?;
        if actor_id == job.owner_id {
            return Ok(applications);
        }

        Ok(applications
            .into_iter()
            .filter(|a| a.worker_id == actor_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            jobdb::{ApplicationExt, JobExt},
            memory::MemoryStore,
        },
        service::testing::{pending_job, store, user, RecordingGateway},
    };

    fn service(store: &Arc<MemoryStore>) -> ApplicationService {
        let notifications = NotificationService::new(store.clone(), Arc::new(RecordingGateway::default()));
        ApplicationService::new(store.clone(), Arc::new(notifications))
    }

    #[tokio::test]
    async fn accepting_one_rejects_every_sibling_and_starts_the_job() {
        let store = store();
        let service = service(&store);
        let owner = user(&store, "owner").await;
        let job = pending_job(&store, owner.id, None).await;

        let mut applications = Vec::new();
        for i in 0..4 {
            let worker = user(&store, &format!("worker{}", i)).await;
            applications.push(
                service
                    .create_application(worker.id, job.id, None, ApplicationType::Apply)
                    .await
                    .unwrap(),
            );
        }

        let chosen = &applications[2];
        let outcome = service.accept_application(owner.id, chosen.id).await.unwrap();

        assert_eq!(outcome.application.status, ApplicationStatus::Accepted);
        assert_eq!(outcome.rejected.len(), 3);
        assert_eq!(outcome.job.status, JobStatus::InProgress);
        assert_eq!(outcome.job.worker_id, Some(chosen.worker_id));

        let stored = store.get_job_applications(job.id).await.unwrap();
        let accepted: Vec<_> = stored.iter().filter(|a| a.status == ApplicationStatus::Accepted).collect();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].id, chosen.id);
        assert!(stored
            .iter()
            .filter(|a| a.id != chosen.id)
            .all(|a| a.status == ApplicationStatus::Rejected));

        let job = store.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.worker_id, Some(chosen.worker_id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_acceptances_have_exactly_one_winner() {
        let store = store();
        let service = service(&store);
        let owner = user(&store, "owner").await;
        let owner_id = owner.id;
        let job = pending_job(&store, owner.id, None).await;
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let first = service.create_application(a.id, job.id, None, ApplicationType::Apply).await.unwrap();
        let second = service.create_application(b.id, job.id, None, ApplicationType::Apply).await.unwrap();

        let (left, right) = tokio::join!(
            {
                let service = service.clone();
                tokio::spawn(async move { service.accept_application(owner_id, first.id).await })
            },
            {
                let service = service.clone();
                tokio::spawn(async move { service.accept_application(owner_id, second.id).await })
            }
        );
        let results = [left.unwrap(), right.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(ServiceError::Conflict(_))))
                .count(),
            1
        );

        let stored = store.get_job_applications(job.id).await.unwrap();
        assert_eq!(stored.iter().filter(|a| a.status == ApplicationStatus::Accepted).count(), 1);
        assert_eq!(stored.iter().filter(|a| a.status == ApplicationStatus::Rejected).count(), 1);
    }

    #[tokio::test]
    async fn only_the_resolver_may_resolve() {
        let store = store();
        let service = service(&store);
        let owner = user(&store, "owner").await;
        let worker = user(&store, "worker").await;
        let job = pending_job(&store, owner.id, None).await;

        let applied = service
            .create_application(worker.id, job.id, None, ApplicationType::Apply)
            .await
            .unwrap();
        assert!(matches!(
            service.accept_application(worker.id, applied.id).await,
            Err(ServiceError::Forbidden(_))
        ));

        let other_job = pending_job(&store, owner.id, None).await;
        let invite = service
            .create_application(owner.id, other_job.id, Some(worker.id), ApplicationType::Invite)
            .await
            .unwrap();
        assert!(matches!(
            service.accept_application(owner.id, invite.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        let outcome = service.accept_application(worker.id, invite.id).await.unwrap();
        assert_eq!(outcome.job.worker_id, Some(worker.id));
    }

    #[tokio::test]
    async fn resolved_applications_stay_resolved() {
        let store = store();
        let service = service(&store);
        let owner = user(&store, "owner").await;
        let winner = user(&store, "winner").await;
        let loser = user(&store, "loser").await;
        let job = pending_job(&store, owner.id, None).await;
        let won = service.create_application(winner.id, job.id, None, ApplicationType::Apply).await.unwrap();
        let lost = service.create_application(loser.id, job.id, None, ApplicationType::Apply).await.unwrap();

        service.accept_application(owner.id, won.id).await.unwrap();

        assert!(matches!(
            service.reject_application(owner.id, lost.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.accept_application(owner.id, won.id).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            service
                .update_application_status(owner.id, won.id, ApplicationStatus::Pending)
                .await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_pending_applications_conflict() {
        let store = store();
        let service = service(&store);
        let owner = user(&store, "owner").await;
        let worker = user(&store, "worker").await;
        let job = pending_job(&store, owner.id, None).await;

        service.create_application(worker.id, job.id, None, ApplicationType::Apply).await.unwrap();
        assert!(matches!(
            service.create_application(worker.id, job.id, None, ApplicationType::Apply).await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            service.create_application(owner.id, job.id, None, ApplicationType::Apply).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn non_owners_only_see_their_own_applications() {
        let store = store();
        let service = service(&store);
        let owner = user(&store, "owner").await;
        let a = user(&store, "a").await;
        let b = user(&store, "b").await;
        let job = pending_job(&store, owner.id, None).await;
        let mine = service.create_application(a.id, job.id, None, ApplicationType::Apply).await.unwrap();
        let theirs = service.create_application(b.id, job.id, None, ApplicationType::Apply).await.unwrap();

        assert_eq!(service.list_job_applications(owner.id, job.id).await.unwrap().len(), 2);
        let visible = service.list_job_applications(a.id, job.id).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, mine.id);

        assert!(matches!(
            service.get_application(a.id, theirs.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.get_application(a.id, Uuid::new_v4()).await,
            Err(ServiceError::ApplicationNotFound(_))
        ));
    }
}
