// db/db.rs
use sqlx::{Pool, Postgres};

use super::{
    jobdb::{ApplicationExt, JobExt},
    notificationdb::NotificationExt,
    ratedb::RateExt,
    taxonomydb::TaxonomyExt,
    userdb::UserExt,
};

#[derive(Debug, Clone)]
pub struct DBClient {
    pub pool: Pool<Postgres>,
}

impl DBClient {
    pub fn new(pool: Pool<Postgres>) -> Self {
        DBClient { pool }
    }
}

/// Every repository the services need, as one object.
pub trait Store:
    UserExt + JobExt + ApplicationExt + RateExt + NotificationExt + TaxonomyExt + std::fmt::Debug + Send + Sync
{
}

impl<T> Store for T where
    T: UserExt + JobExt + ApplicationExt + RateExt + NotificationExt + TaxonomyExt + std::fmt::Debug + Send + Sync
{
}
