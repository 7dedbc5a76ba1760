// db/notificationdb.rs
use async_trait::async_trait;
use sqlx::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::notificationmodel::{Device, NewNotification, NotificationView, PushNotification};

#[async_trait]
pub trait NotificationExt {
    /// Upserts on the push token: a token seen before moves to `user_id`
    /// and becomes active again.
    async fn register_device(
        &self,
        user_id: Uuid,
        push_token: &str,
        platform: Option<String>,
    ) -> Result<Device, Error>;

    async fn get_devices_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<Device>, Error>;

    async fn deactivate_devices(&self, push_tokens: &[String]) -> Result<u64, Error>;

    async fn create_notification(&self, draft: &NewNotification) -> Result<PushNotification, Error>;

    /// Notifications sent to the user, newest first. With `unread_only` the
    /// read filter runs before paging.
    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationView>, Error>;

    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64, Error>;

    /// Only returns the notification when it was sent to the user.
    async fn get_notification_for_user(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PushNotification>, Error>;

    async fn mark_notification_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), Error>;
}

#[async_trait]
impl NotificationExt for DBClient {
    async fn register_device(
        &self,
        user_id: Uuid,
        push_token: &str,
        platform: Option<String>,
    ) -> Result<Device, Error> {
        sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (user_id, push_token, platform)
            VALUES ($1, $2, $3)
            ON CONFLICT (push_token) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                platform = EXCLUDED.platform,
                record_state = 'active'
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(push_token)
        .bind(platform)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_devices_for_users(&self, user_ids: &[Uuid]) -> Result<Vec<Device>, Error> {
        sqlx::query_as::<_, Device>(
            r#"
            SELECT * FROM devices
            WHERE user_id = ANY($1) AND record_state = 'active'
            ORDER BY created_at
            "#,
        )
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await
    }

    async fn deactivate_devices(&self, push_tokens: &[String]) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE devices SET record_state = 'deleted'
            WHERE push_token = ANY($1) AND record_state = 'active'
            "#,
        )
        .bind(push_tokens)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn create_notification(&self, draft: &NewNotification) -> Result<PushNotification, Error> {
        let mut tx = self.pool.begin().await?;

        let notification = sqlx::query_as::<_, PushNotification>(
            r#"
            INSERT INTO push_notifications (title, content, notification_type, job_id)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.notification_type)
        .bind(draft.job_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO notification_devices (notification_id, device_id, user_id)
            SELECT $1, r.device_id, r.user_id
            FROM UNNEST($2::uuid[], $3::uuid[]) AS r(device_id, user_id)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(notification.id)
        .bind(draft.recipients.iter().map(|r| r.device_id).collect::<Vec<_>>())
        .bind(draft.recipients.iter().map(|r| r.user_id).collect::<Vec<_>>())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(notification)
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NotificationView>, Error> {
        sqlx::query_as::<_, NotificationView>(
            r#"
            SELECT n.id, n.title, n.content, n.notification_type, n.job_id,
                   EXISTS (
                       SELECT 1 FROM notification_reads r
                       WHERE r.notification_id = n.id AND r.user_id = $1
                   ) AS is_read,
                   n.created_at
            FROM push_notifications n
            WHERE n.record_state = 'active'
              AND EXISTS (
                  SELECT 1 FROM notification_devices nd
                  WHERE nd.notification_id = n.id AND nd.user_id = $1
              )
              AND (
                  NOT $2 OR NOT EXISTS (
                      SELECT 1 FROM notification_reads r
                      WHERE r.notification_id = n.id AND r.user_id = $1
                  )
              )
            ORDER BY n.created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(unread_only)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64, Error> {
        sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM push_notifications n
            WHERE n.record_state = 'active'
              AND EXISTS (
                  SELECT 1 FROM notification_devices nd
                  WHERE nd.notification_id = n.id AND nd.user_id = $1
              )
              AND NOT EXISTS (
                  SELECT 1 FROM notification_reads r
                  WHERE r.notification_id = n.id AND r.user_id = $1
              )
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn get_notification_for_user(
        &self,
        notification_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<PushNotification>, Error> {
        sqlx::query_as::<_, PushNotification>(
            r#"
            SELECT n.* FROM push_notifications n
            WHERE n.id = $1 AND n.record_state = 'active'
              AND EXISTS (
                  SELECT 1 FROM notification_devices nd
                  WHERE nd.notification_id = n.id AND nd.user_id = $2
              )
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn mark_notification_read(&self, notification_id: Uuid, user_id: Uuid) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO notification_reads (notification_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (notification_id, user_id) DO NOTHING
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
