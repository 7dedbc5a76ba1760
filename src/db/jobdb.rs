// db/jobdb.rs
use async_trait::async_trait;
use sqlx::{Error, Postgres, QueryBuilder};
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::jobmodel::*,
    rules::application::{resolve_competitors, AcceptancePlan},
};

#[async_trait]
pub trait JobExt {
    async fn create_job(&self, new_job: NewJob) -> Result<Job, Error>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, Error>;

    async fn get_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, Error>;

    async fn get_job_service_ids(&self, job_id: Uuid) -> Result<Vec<Uuid>, Error>;

    /// Conditional on the job still being in `from`; `None` when it is not.
    async fn update_job_status(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Option<Job>, Error>;

    /// Conditional on the job still being in `expected`.
    async fn soft_delete_job(&self, job_id: Uuid, expected: JobStatus) -> Result<bool, Error>;
}

#[async_trait]
pub trait ApplicationExt {
    async fn create_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        application_type: ApplicationType,
    ) -> Result<Application, Error>;

    async fn get_application(&self, application_id: Uuid) -> Result<Option<Application>, Error>;

    async fn get_job_applications(&self, job_id: Uuid) -> Result<Vec<Application>, Error>;

    async fn get_pending_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Option<Application>, Error>;

    /// Accepts one application, rejects its pending siblings and starts the
    /// job, all in one transaction. `None` means another acceptance won.
    async fn accept_application(&self, plan: &AcceptancePlan) -> Result<Option<AcceptanceOutcome>, Error>;

    /// `None` when the application is no longer pending.
    async fn reject_application(&self, application_id: Uuid) -> Result<Option<Application>, Error>;
}

#[async_trait]
impl JobExt for DBClient {
    async fn create_job(&self, new_job: NewJob) -> Result<Job, Error> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (owner_id, title, description, cost, address, location_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new_job.owner_id)
        .bind(new_job.title)
        .bind(new_job.description)
        .bind(new_job.cost)
        .bind(new_job.address)
        .bind(new_job.location_id)
        .fetch_one(&mut *tx)
        .await?;

        if !new_job.service_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO job_services (job_id, service_id)
                SELECT $1, UNNEST($2::uuid[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(job.id)
            .bind(&new_job.service_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(job)
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<Job>, Error> {
        sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE id = $1 AND record_state = 'active'",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, Error> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT j.* FROM jobs j WHERE j.record_state = 'active'");

        if let Some(status) = filter.status {
            query.push(" AND j.status = ").push_bind(status);
        }
        if let Some(owner_id) = filter.owner_id {
            query.push(" AND j.owner_id = ").push_bind(owner_id);
        }
        if let Some(location_ids) = &filter.location_ids {
            query
                .push(" AND j.location_id = ANY(")
                .push_bind(location_ids.clone())
                .push(")");
        }
        if let Some(service_id) = filter.service_id {
            query
                .push(" AND EXISTS (SELECT 1 FROM job_services js WHERE js.job_id = j.id AND js.service_id = ")
                .push_bind(service_id)
                .push(")");
        }

        query
            .push(" ORDER BY j.created_at DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        query.build_query_as::<Job>().fetch_all(&self.pool).await
    }

    async fn get_job_service_ids(&self, job_id: Uuid) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT js.service_id FROM job_services js
            JOIN services s ON s.id = js.service_id
            WHERE js.job_id = $1 AND s.record_state = 'active'
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn update_job_status(
        &self,
        job_id: Uuid,
        from: JobStatus,
        to: JobStatus,
    ) -> Result<Option<Job>, Error> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2 AND record_state = 'active'
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await
    }

    async fn soft_delete_job(&self, job_id: Uuid, expected: JobStatus) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE jobs SET record_state = 'deleted', updated_at = NOW()
            WHERE id = $1 AND status = $2 AND record_state = 'active'
            "#,
        )
        .bind(job_id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl ApplicationExt for DBClient {
    async fn create_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
        application_type: ApplicationType,
    ) -> Result<Application, Error> {
        sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (job_id, worker_id, application_type)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .bind(application_type)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_application(&self, application_id: Uuid) -> Result<Option<Application>, Error> {
        sqlx::query_as::<_, Application>(
            "SELECT * FROM applications WHERE id = $1 AND record_state = 'active'",
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_job_applications(&self, job_id: Uuid) -> Result<Vec<Application>, Error> {
        sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE job_id = $1 AND record_state = 'active'
            ORDER BY created_at
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_pending_application(
        &self,
        job_id: Uuid,
        worker_id: Uuid,
    ) -> Result<Option<Application>, Error> {
        sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE job_id = $1 AND worker_id = $2
              AND status = 'pending' AND record_state = 'active'
            "#,
        )
        .bind(job_id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn accept_application(&self, plan: &AcceptancePlan) -> Result<Option<AcceptanceOutcome>, Error> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent acceptances for the same job.
        let locked = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM jobs
            WHERE id = $1 AND status = 'pending' AND worker_id IS NULL AND record_state = 'active'
            FOR UPDATE
            "#,
        )
        .bind(plan.job_id)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            tracing::warn!("Job {} is no longer pending, acceptance dropped", plan.job_id);
            return Ok(None);
        }

        let accepted = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications SET status = 'accepted', updated_at = NOW()
            WHERE id = $1 AND job_id = $2 AND status = 'pending' AND record_state = 'active'
            RETURNING *
            "#,
        )
        .bind(plan.application_id)
        .bind(plan.job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(accepted) = accepted else {
            tracing::warn!("Application {} is no longer pending, acceptance dropped", plan.application_id);
            return Ok(None);
        };

        let siblings = sqlx::query_as::<_, Application>(
            r#"
            SELECT * FROM applications
            WHERE job_id = $1 AND id <> $2 AND status = 'pending' AND record_state = 'active'
            FOR UPDATE
            "#,
        )
        .bind(plan.job_id)
        .bind(plan.application_id)
        .fetch_all(&mut *tx)
        .await?;

        let losers = resolve_competitors(accepted.id, plan.job_id, &siblings);

        let rejected = if losers.is_empty() {
            Vec::new()
        } else {
            sqlx::query_as::<_, Application>(
                r#"
                UPDATE applications SET status = 'rejected', updated_at = NOW()
                WHERE id = ANY($1) AND status = 'pending'
                RETURNING *
                "#,
            )
            .bind(&losers)
            .fetch_all(&mut *tx)
            .await?
        };

        let job = sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET status = 'in_progress', worker_id = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(plan.job_id)
        .bind(plan.worker_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job) = job else {
            return Ok(None);
        };

        tx.commit().await?;

        Ok(Some(AcceptanceOutcome {
            application: accepted,
            job,
            rejected,
        }))
    }

    async fn reject_application(&self, application_id: Uuid) -> Result<Option<Application>, Error> {
        sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications SET status = 'rejected', updated_at = NOW()
            WHERE id = $1 AND status = 'pending' AND record_state = 'active'
            RETURNING *
            "#,
        )
        .bind(application_id)
        .fetch_optional(&self.pool)
        .await
    }
}
