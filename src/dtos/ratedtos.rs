use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateRateDto {
    #[serde(alias = "job_uuid")]
    pub job_id: Uuid,

    #[serde(alias = "receiver_uuid")]
    pub receiver_id: Option<Uuid>,

    #[validate(range(min = 1, max = 5, message = "Rate must be between 1 and 5"))]
    pub rate: i32,

    #[validate(length(max = 2000, message = "Review is too long"))]
    pub review: Option<String>,
}
