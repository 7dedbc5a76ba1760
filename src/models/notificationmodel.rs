use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::usermodel::RecordState;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    NewJob,
    ApplicationReceived,
    ApplicationAccepted,
    ApplicationRejected,
    RateReceived,
}

impl NotificationType {
    pub fn to_str(&self) -> &str {
        match self {
            NotificationType::NewJob => "new_job",
            NotificationType::ApplicationReceived => "application_received",
            NotificationType::ApplicationAccepted => "application_accepted",
            NotificationType::ApplicationRejected => "application_rejected",
            NotificationType::RateReceived => "rate_received",
        }
    }
}

/// A registered push target. One user may own several.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Device {
    pub id: Uuid,
    pub user_id: Uuid,
    pub push_token: String,
    pub platform: Option<String>,
    #[serde(skip_serializing)]
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PushNotification {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub notification_type: NotificationType,
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing)]
    pub record_state: RecordState,
    pub created_at: DateTime<Utc>,
}

/// A notification as seen by one user, with that user's read receipt.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct NotificationView {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub notification_type: NotificationType,
    pub job_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Draft handed to the repository; `recipients` become the `sent_to` rows.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub content: String,
    pub notification_type: NotificationType,
    pub job_id: Option<Uuid>,
    pub recipients: Vec<Recipient>,
}

/// A device and the user who owned it when the notification was sent.
/// History follows the user, not whoever holds the token later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recipient {
    pub device_id: Uuid,
    pub user_id: Uuid,
}

impl From<&Device> for Recipient {
    fn from(device: &Device) -> Self {
        Recipient {
            device_id: device.id,
            user_id: device.user_id,
        }
    }
}

/// Result the push gateway reports for a single device token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketOutcome {
    Delivered,
    DeviceNotRegistered,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
    pub unregistered: Vec<String>,
}
