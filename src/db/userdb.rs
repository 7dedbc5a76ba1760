// db/userdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::usermodel::{NewUser, User};

#[async_trait]
pub trait UserExt {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<User>, Error>;

    async fn save_user(&self, new_user: NewUser) -> Result<User, Error>;

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<User, Error>;

    async fn update_user_avatar(
        &self,
        user_id: Uuid,
        avatar_key: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, Error>;

    /// Marks the account and its devices deleted.
    async fn soft_delete_user(&self, user_id: Uuid) -> Result<(), Error>;

    /// Keyset page over active user ids, ordered by id.
    async fn get_user_ids_after(&self, after: Option<Uuid>, limit: i64) -> Result<Vec<Uuid>, Error>;
}

#[async_trait]
impl UserExt for DBClient {
    async fn get_user(
        &self,
        user_id: Option<Uuid>,
        email: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Option<User>, Error> {
        let mut user: Option<User> = None;

        if let Some(user_id) = user_id {
            user = sqlx::query_as::<_, User>(
                "SELECT * FROM users WHERE id = $1 AND record_state = 'active'",
            )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(email) = email {
            user = sqlx::query_as::<_, User>(
                "SELECT * FROM users WHERE lower(email) = lower($1) AND record_state = 'active'",
            )
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        } else if let Some(phone) = phone {
            user = sqlx::query_as::<_, User>(
                "SELECT * FROM users WHERE phone = $1 AND record_state = 'active'",
            )
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        }

        Ok(user)
    }

    async fn save_user(&self, new_user: NewUser) -> Result<User, Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, phone, password, oauth_issuer)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(new_user.name)
        .bind(new_user.email)
        .bind(new_user.phone)
        .bind(new_user.password)
        .bind(new_user.oauth_issuer)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user_profile(
        &self,
        user_id: Uuid,
        name: Option<String>,
        email: Option<String>,
        phone: Option<String>,
    ) -> Result<User, Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                updated_at = NOW()
            WHERE id = $1 AND record_state = 'active'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(email)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_user_avatar(
        &self,
        user_id: Uuid,
        avatar_key: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<User, Error> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET avatar_key = $2, avatar_url = $3, updated_at = NOW()
            WHERE id = $1 AND record_state = 'active'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(avatar_key)
        .bind(avatar_url)
        .fetch_one(&self.pool)
        .await
    }

    async fn soft_delete_user(&self, user_id: Uuid) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE users SET record_state = 'deleted', updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE devices SET record_state = 'deleted' WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_user_ids_after(&self, after: Option<Uuid>, limit: i64) -> Result<Vec<Uuid>, Error> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM users
            WHERE record_state = 'active' AND ($1::uuid IS NULL OR id > $1)
            ORDER BY id
            LIMIT $2
            "#,
        )
        .bind(after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
