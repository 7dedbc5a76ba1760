// db/ratedb.rs
use async_trait::async_trait;
use sqlx::{Error, PgConnection};
use uuid::Uuid;

use super::db::DBClient;
use crate::{
    models::{
        jobmodel::Job,
        ratemodel::{NewRate, Rate},
    },
    rules::rating::{average, check_rateable, counterpart},
};

#[derive(Debug, Clone)]
pub enum RateInsert {
    Created(Rate),
    /// The (job, giver) pair already has a rate.
    Duplicate,
    /// Seen under the row lock: the job left the rateable states or the
    /// giver and receiver are no longer its two parties.
    NotRateable,
}

#[async_trait]
pub trait RateExt {
    async fn get_rate_by_job_and_giver(&self, job_id: Uuid, gives_id: Uuid) -> Result<Option<Rate>, Error>;

    async fn get_received_rates(&self, receiver_id: Uuid) -> Result<Vec<Rate>, Error>;

    /// Inserts the rate, optionally completes the job and refreshes the
    /// receiver's average, in one transaction. Fails with `RowNotFound`
    /// when the job disappeared.
    async fn create_rate(&self, new_rate: &NewRate) -> Result<RateInsert, Error>;

    /// `None` when the user has no rates; the stored value is left as is.
    async fn recompute_average_rate(&self, user_id: Uuid) -> Result<Option<f64>, Error>;
}

async fn refresh_average_rate(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<f64>, Error> {
    let rates = sqlx::query_scalar::<_, i32>(
        "SELECT rate FROM rates WHERE receiver_id = $1 AND record_state = 'active'",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    let Some(avg) = average(&rates) else {
        return Ok(None);
    };

    sqlx::query("UPDATE users SET average_rate = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(avg)
        .execute(&mut *conn)
        .await?;

    Ok(Some(avg))
}

/// Re-check of the rating rules against the locked job row.
pub(crate) fn still_rateable(job: &Job, new_rate: &NewRate) -> bool {
    check_rateable(job).is_ok() && counterpart(job, new_rate.gives_id).ok() == Some(new_rate.receiver_id)
}

#[async_trait]
impl RateExt for DBClient {
    async fn get_rate_by_job_and_giver(&self, job_id: Uuid, gives_id: Uuid) -> Result<Option<Rate>, Error> {
        sqlx::query_as::<_, Rate>(
            r#"
            SELECT * FROM rates
            WHERE job_id = $1 AND gives_id = $2 AND record_state = 'active'
            "#,
        )
        .bind(job_id)
        .bind(gives_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_received_rates(&self, receiver_id: Uuid) -> Result<Vec<Rate>, Error> {
        sqlx::query_as::<_, Rate>(
            r#"
            SELECT * FROM rates
            WHERE receiver_id = $1 AND record_state = 'active'
            ORDER BY created_at DESC
            "#,
        )
        .bind(receiver_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn create_rate(&self, new_rate: &NewRate) -> Result<RateInsert, Error> {
        let mut tx = self.pool.begin().await?;

        // Concurrent rates for one job queue up behind this lock.
        let job = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE id = $1 AND record_state = 'active' FOR UPDATE",
        )
        .bind(new_rate.job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(Error::RowNotFound)?;

        if !still_rateable(&job, new_rate) {
            return Ok(RateInsert::NotRateable);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM rates
                WHERE job_id = $1 AND gives_id = $2 AND record_state = 'active'
            )
            "#,
        )
        .bind(new_rate.job_id)
        .bind(new_rate.gives_id)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            return Ok(RateInsert::Duplicate);
        }

        let rate = sqlx::query_as::<_, Rate>(
            r#"
            INSERT INTO rates (job_id, gives_id, receiver_id, rate, review)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new_rate.job_id)
        .bind(new_rate.gives_id)
        .bind(new_rate.receiver_id)
        .bind(new_rate.rate)
        .bind(&new_rate.review)
        .fetch_one(&mut *tx)
        .await?;

        if new_rate.complete_job {
            sqlx::query(
                r#"
                UPDATE jobs SET status = 'completed', updated_at = NOW()
                WHERE id = $1 AND status IN ('in_progress', 'on_confirmation')
                "#,
            )
            .bind(new_rate.job_id)
            .execute(&mut *tx)
            .await?;
        }

        refresh_average_rate(&mut *tx, new_rate.receiver_id).await?;

        tx.commit().await?;
        Ok(RateInsert::Created(rate))
    }

    async fn recompute_average_rate(&self, user_id: Uuid) -> Result<Option<f64>, Error> {
        let mut tx = self.pool.begin().await?;
        let avg = refresh_average_rate(&mut *tx, user_id).await?;
        tx.commit().await?;
        Ok(avg)
    }
}
