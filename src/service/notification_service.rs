// service/notification_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::Store,
    models::{
        jobmodel::{Application, ApplicationStatus, ApplicationType, Job},
        notificationmodel::*,
        ratemodel::Rate,
    },
    rules::{
        application::{initiator_of, resolver_of},
        audience::{select_devices, select_job_audience, summarize_delivery},
    },
    service::{
        error::ServiceError,
        push::{PushGateway, PushPayload, PUSH_BATCH_LIMIT},
    },
};

#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<dyn Store>,
    push_gateway: Arc<dyn PushGateway>,
}

impl NotificationService {
    pub fn new(db_client: Arc<dyn Store>, push_gateway: Arc<dyn PushGateway>) -> Self {
        Self {
            db_client,
            push_gateway,
        }
    }

    /// Tells everyone living in the job's location, except its owner.
    pub async fn notify_job_created(&self, job: &Job) -> Result<Option<DeliveryReport>, ServiceError> {
        let Some(location_id) = job.location_id else {
            return Ok(None);
        };

        let memberships = self.db_client.get_location_memberships(&[location_id]).await?;
        let audience = select_job_audience(job, &memberships);

        self.notify_users(
            &audience,
            "New job near you".to_string(),
            job.title.clone(),
            NotificationType::NewJob,
            Some(job.id),
        )
        .await
    }

    pub async fn notify_application_received(
        &self,
        application: &Application,
        job: &Job,
    ) -> Result<Option<DeliveryReport>, ServiceError> {
        let recipient = resolver_of(application.application_type, job, application.worker_id);
        let title = match application.application_type {
            ApplicationType::Apply => "New application",
            ApplicationType::Invite => "You were invited to a job",
        };

        self.notify_users(
            &[recipient],
            title.to_string(),
            job.title.clone(),
            NotificationType::ApplicationReceived,
            Some(job.id),
        )
        .await
    }

    pub async fn notify_application_resolved(
        &self,
        application: &Application,
        job: &Job,
    ) -> Result<Option<DeliveryReport>, ServiceError> {
        let recipient = initiator_of(application.application_type, job, application.worker_id);
        let (title, notification_type) = match application.status {
            ApplicationStatus::Accepted => ("Application accepted", NotificationType::ApplicationAccepted),
            ApplicationStatus::Rejected => ("Application rejected", NotificationType::ApplicationRejected),
            ApplicationStatus::Pending => return Ok(None),
        };

        self.notify_users(
            &[recipient],
            title.to_string(),
            job.title.clone(),
            notification_type,
            Some(job.id),
        )
        .await
    }

    pub async fn notify_rate_received(&self, rate: &Rate) -> Result<Option<DeliveryReport>, ServiceError> {
        self.notify_users(
            &[rate.receiver_id],
            "You received a new rate".to_string(),
            format!("{} out of 5", rate.rate),
            NotificationType::RateReceived,
            Some(rate.job_id),
        )
        .await
    }

    /// Stores one notification addressed to every active device of `user_ids`
    /// and pushes it. Users without devices are skipped; when nobody has a
    /// device nothing is stored and `None` is returned.
    pub async fn notify_users(
        &self,
        user_ids: &[Uuid],
        title: String,
        content: String,
        notification_type: NotificationType,
        job_id: Option<Uuid>,
    ) -> Result<Option<DeliveryReport>, ServiceError> {
        if user_ids.is_empty() {
            return Ok(None);
        }

        let devices = self.db_client.get_devices_for_users(user_ids).await?;
        let devices = select_devices(user_ids, &devices);
        if devices.is_empty() {
            tracing::debug!(
                "no devices for {} notification to {} users",
                notification_type.to_str(),
                user_ids.len()
            );
            return Ok(None);
        }

        let notification = self
            .db_client
            .create_notification(&NewNotification {
                title,
                content,
                notification_type,
                job_id,
                recipients: devices.iter().map(Recipient::from).collect(),
            })
            .await?;

        let report = self.deliver(&notification, &devices).await;

        if !report.unregistered.is_empty() {
            match self.db_client.deactivate_devices(&report.unregistered).await {
                Ok(count) => tracing::info!("deactivated {} unregistered devices", count),
                Err(e) => tracing::error!("failed to deactivate unregistered devices: {}", e),
            }
        }

        tracing::info!(
            "notification {} ({}) delivered to {}/{} devices",
            notification.id,
            notification_type.to_str(),
            report.delivered,
            devices.len()
        );

        Ok(Some(report))
    }

    /// Best effort: a failing batch is logged and counted, never retried.
    async fn deliver(&self, notification: &PushNotification, devices: &[Device]) -> DeliveryReport {
        let payload = PushPayload {
            title: notification.title.clone(),
            body: notification.content.clone(),
            notification_type: notification.notification_type,
            notification_id: notification.id,
            job_id: notification.job_id,
        };
        let tokens: Vec<String> = devices.iter().map(|d| d.push_token.clone()).collect();
        let mut report = DeliveryReport::default();

        for chunk in tokens.chunks(PUSH_BATCH_LIMIT) {
            match self.push_gateway.publish(chunk, &payload).await {
                Ok(outcomes) => {
                    for (token, outcome) in chunk.iter().zip(outcomes.iter()) {
                        if let TicketOutcome::Failed(reason) = outcome {
                            tracing::warn!("push to {} failed: {}", token, reason);
                        }
                    }
                    let partial = summarize_delivery(chunk, &outcomes);
                    report.delivered += partial.delivered;
                    report.failed += partial.failed;
                    report.unregistered.extend(partial.unregistered);
                }
                Err(e) => {
                    tracing::error!(
                        "push batch of {} for notification {} failed: {}",
                        chunk.len(),
                        notification.id,
                        e
                    );
                    report.failed += chunk.len();
                }
            }
        }

        report
    }

    pub fn dispatch_job_created(&self, job: Job) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.notify_job_created(&job).await {
                tracing::error!("job {} notification failed: {}", job.id, e);
            }
        });
    }

    pub fn dispatch_application_received(&self, application: Application, job: Job) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.notify_application_received(&application, &job).await {
                tracing::error!("application {} notification failed: {}", application.id, e);
            }
        });
    }

    pub fn dispatch_application_resolved(&self, applications: Vec<Application>, job: Job) {
        let service = self.clone();
        tokio::spawn(async move {
            for application in applications {
                if let Err(e) = service.notify_application_resolved(&application, &job).await {
                    tracing::error!("application {} notification failed: {}", application.id, e);
                }
            }
        });
    }

    pub fn dispatch_rate_received(&self, rate: Rate) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.notify_rate_received(&rate).await {
                tracing::error!("rate {} notification failed: {}", rate.id, e);
            }
        });
    }

    /// One page of the user's notifications plus their total unread count.
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        limit: usize,
        unread_only: bool,
    ) -> Result<(Vec<NotificationView>, i64), ServiceError> {
        let offset = (page.max(1) - 1) as i64 * limit as i64;
        let notifications = self
            .db_client
            .get_user_notifications(user_id, unread_only, limit as i64, offset)
            .await?;
        let unread = self.db_client.count_unread_notifications(user_id).await?;
        Ok((notifications, unread))
    }

    /// Idempotent. Only notifications sent to one of the user's devices
    /// can be marked.
    pub async fn mark_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        self.db_client
            .get_notification_for_user(notification_id, user_id)
            .await?
            .ok_or(ServiceError::NotificationNotFound(notification_id))?;

        self.db_client.mark_notification_read(notification_id, user_id).await?;
        Ok(())
    }
}
