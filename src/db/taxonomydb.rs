// db/taxonomydb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::taxonomymodel::{Location, LocationMembership, Service};

/// Guards the hierarchy walks against accidental parent cycles.
pub const MAX_TAXONOMY_DEPTH: i32 = 32;

#[async_trait]
pub trait TaxonomyExt {
    async fn get_services(&self) -> Result<Vec<Service>, Error>;

    async fn get_locations(&self) -> Result<Vec<Location>, Error>;

    /// The service and its ancestors, root first.
    async fn get_service_path(&self, service_id: Uuid) -> Result<Vec<Service>, Error>;

    /// The location and every location below it.
    async fn get_location_subtree_ids(&self, location_id: Uuid) -> Result<Vec<Uuid>, Error>;

    async fn get_existing_service_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, Error>;

    async fn get_existing_location_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, Error>;

    /// Memberships of active users in any of `location_ids`.
    async fn get_location_memberships(&self, location_ids: &[Uuid]) -> Result<Vec<LocationMembership>, Error>;

    async fn get_user_location_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, Error>;

    async fn set_user_locations(&self, user_id: Uuid, location_ids: &[Uuid]) -> Result<(), Error>;

    async fn get_user_service_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, Error>;

    async fn set_user_services(&self, user_id: Uuid, service_ids: &[Uuid]) -> Result<(), Error>;
}

#[async_trait]
impl TaxonomyExt for DBClient {
    async fn get_services(&self) -> Result<Vec<Service>, Error> {
        sqlx::query_as::<_, Service>(
            "SELECT * FROM services WHERE record_state = 'active' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_locations(&self) -> Result<Vec<Location>, Error> {
        sqlx::query_as::<_, Location>(
            "SELECT * FROM locations WHERE record_state = 'active' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_service_path(&self, service_id: Uuid) -> Result<Vec<Service>, Error> {
        sqlx::query_as::<_, Service>(
            r#"
            WITH RECURSIVE chain AS (
                SELECT s.id, s.parent_id, s.name, s.record_state, 0 AS depth
                FROM services s
                WHERE s.id = $1 AND s.record_state = 'active'
                UNION ALL
                SELECT p.id, p.parent_id, p.name, p.record_state, c.depth + 1
                FROM services p
                JOIN chain c ON p.id = c.parent_id
                WHERE c.depth < $2 AND p.record_state = 'active'
            )
            SELECT id, parent_id, name, record_state FROM chain ORDER BY depth DESC
            "#,
        )
        .bind(service_id)
        .bind(MAX_TAXONOMY_DEPTH)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_location_subtree_ids(&self, location_id: Uuid) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            WITH RECURSIVE subtree AS (
                SELECT l.id, 0 AS depth
                FROM locations l
                WHERE l.id = $1 AND l.record_state = 'active'
                UNION ALL
                SELECT c.id, s.depth + 1
                FROM locations c
                JOIN subtree s ON c.parent_id = s.id
                WHERE s.depth < $2 AND c.record_state = 'active'
            )
            SELECT DISTINCT id FROM subtree
            "#,
        )
        .bind(location_id)
        .bind(MAX_TAXONOMY_DEPTH)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_existing_service_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM services WHERE id = ANY($1) AND record_state = 'active'",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_existing_location_ids(&self, ids: &[Uuid]) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM locations WHERE id = ANY($1) AND record_state = 'active'",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_location_memberships(&self, location_ids: &[Uuid]) -> Result<Vec<LocationMembership>, Error> {
        sqlx::query_as::<_, LocationMembership>(
            r#"
            SELECT ul.user_id, ul.location_id
            FROM user_locations ul
            JOIN users u ON u.id = ul.user_id
            WHERE ul.location_id = ANY($1) AND u.record_state = 'active'
            ORDER BY ul.user_id
            "#,
        )
        .bind(location_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_user_location_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT ul.location_id FROM user_locations ul
            JOIN locations l ON l.id = ul.location_id
            WHERE ul.user_id = $1 AND l.record_state = 'active'
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn set_user_locations(&self, user_id: Uuid, location_ids: &[Uuid]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_locations WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_locations (user_id, location_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(location_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }

    async fn get_user_service_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT us.service_id FROM user_services us
            JOIN services s ON s.id = us.service_id
            WHERE us.user_id = $1 AND s.record_state = 'active'
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn set_user_services(&self, user_id: Uuid, service_ids: &[Uuid]) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_services WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO user_services (user_id, service_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(service_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await
    }
}
