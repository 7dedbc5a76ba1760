// service/rating_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{ratedb::RateInsert, Store},
    models::ratemodel::*,
    rules::rating::{check_rateable, completes_job, counterpart, validate_rate},
    service::{error::ServiceError, notification_service::NotificationService},
};

const RECOMPUTE_PAGE_SIZE: i64 = 500;

/// Strips markup from a review; blank reviews are dropped.
fn clean_review(review: Option<String>) -> Option<String> {
    review
        .map(|r| ammonia::Builder::empty().clean(r.trim()).to_string())
        .filter(|r| !r.is_empty())
}

#[derive(Debug, Clone)]
pub struct RatingService {
    db_client: Arc<dyn Store>,
    notification_service: Arc<NotificationService>,
}

impl RatingService {
    pub fn new(db_client: Arc<dyn Store>, notification_service: Arc<NotificationService>) -> Self {
        Self {
            db_client,
            notification_service,
        }
    }

    /// Rates the other party of `job_id`; `receiver_id`, when given, must be
    /// that party. The insert, the optional job
    /// completion and the receiver's new average are written together.
    pub async fn create_rate(
        &self,
        giver_id: Uuid,
        job_id: Uuid,
        receiver_id: Option<Uuid>,
        rate: i32,
        review: Option<String>,
    ) -> Result<Rate, ServiceError> {
        validate_rate(rate)?;

        let job = self
            .db_client
            .get_job(job_id)
            .await?
            .ok_or(ServiceError::JobNotFound(job_id))?;

        let counterpart_id = counterpart(&job, giver_id)?;
        if receiver_id.is_some_and(|r| r != counterpart_id) {
            return Err(ServiceError::Forbidden(
                "You can only rate the other party of the job".to_string(),
            ));
        }
        let receiver_id = counterpart_id;
        check_rateable(&job)?;

        if self
            .db_client
            .get_rate_by_job_and_giver(job_id, giver_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::Conflict("You have already rated this job".to_string()));
        }

        let new_rate = NewRate {
            job_id,
            gives_id: giver_id,
            receiver_id,
            rate,
            review: clean_review(review),
            complete_job: completes_job(&job, giver_id),
        };

        let rate = match self.db_client.create_rate(&new_rate).await {
            Ok(RateInsert::Created(rate)) => rate,
            Ok(RateInsert::Duplicate) => {
                return Err(ServiceError::Conflict("You have already rated this job".to_string()))
            }
            Ok(RateInsert::NotRateable) => {
                return Err(ServiceError::Forbidden("This job can no longer be rated".to_string()))
            }
            Err(sqlx::Error::RowNotFound) => return Err(ServiceError::JobNotFound(job_id)),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "user {} rated user {} with {} on job {}",
            giver_id,
            receiver_id,
            rate.rate,
            job_id
        );
        if new_rate.complete_job {
            tracing::info!("job {} completed by owner rating", job_id);
        }

        self.notification_service.dispatch_rate_received(rate.clone());

        Ok(rate)
    }

    /// Recomputes one user's average from their received rates. A user
    /// without rates keeps the stored value.
    pub async fn recompute_average_rate(&self, user_id: Uuid) -> Result<Option<f64>, ServiceError> {
        self.db_client
            .get_user(Some(user_id), None, None)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        Ok(self.db_client.recompute_average_rate(user_id).await?)
    }

    /// Walks every active user in id order. Safe to run repeatedly.
    pub async fn recompute_average_rate_for_all(&self) -> Result<RecomputeSummary, ServiceError> {
        let mut summary = RecomputeSummary::default();
        let mut after = None;

        loop {
            let ids = self
                .db_client
                .get_user_ids_after(after, RECOMPUTE_PAGE_SIZE)
                .await?;
            let Some(last) = ids.last().copied() else {
                break;
            };

            for user_id in ids {
                summary.users_scanned += 1;
                if self.db_client.recompute_average_rate(user_id).await?.is_some() {
                    summary.users_updated += 1;
                }
            }
            after = Some(last);
        }

        tracing::info!(
            "recomputed average rates: {} scanned, {} updated",
            summary.users_scanned,
            summary.users_updated
        );

        Ok(summary)
    }

    pub async fn list_received_rates(&self, user_id: Uuid) -> Result<Vec<Rate>, ServiceError> {
        self.db_client
            .get_user(Some(user_id), None, None)
            .await?
            .ok_or(ServiceError::UserNotFound(user_id))?;

        Ok(self.db_client.get_received_rates(user_id).await?)
    }
}
