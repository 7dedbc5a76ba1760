use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::notificationmodel::NotificationView;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct NotificationQueryDto {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationListDto {
    pub notifications: Vec<NotificationView>,
    /// Across all pages, not just this one.
    pub unread: i64,
}
