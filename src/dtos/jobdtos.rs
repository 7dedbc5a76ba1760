use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use sqlx::types::BigDecimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    models::jobmodel::{JobStatus, NewJob},
    service::job_service::JobSearch,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateJobDto {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 5000, message = "Description must be between 1 and 5000 characters"))]
    pub description: String,

    #[validate(range(min = 0.0, message = "Cost cannot be negative"))]
    pub cost: f64,

    #[validate(length(max = 500))]
    pub address: Option<String>,

    pub location_id: Option<Uuid>,

    #[serde(default)]
    #[validate(length(max = 20, message = "Too many services"))]
    pub service_ids: Vec<Uuid>,
}

impl CreateJobDto {
    pub fn into_new_job(self, owner_id: Uuid) -> Option<NewJob> {
        let cost = BigDecimal::from_f64(self.cost)?.with_scale(2);
        Some(NewJob {
            owner_id,
            title: self.title,
            description: self.description,
            cost,
            address: self.address,
            location_id: self.location_id,
            service_ids: self.service_ids,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JobSearchQueryDto {
    pub status: Option<JobStatus>,
    pub owner_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub service_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 50))]
    pub limit: Option<usize>,
}

impl From<JobSearchQueryDto> for JobSearch {
    fn from(query: JobSearchQueryDto) -> Self {
        JobSearch {
            status: query.status,
            owner_id: query.owner_id,
            location_id: query.location_id,
            service_id: query.service_id,
            page: query.page.unwrap_or(1),
            limit: query.limit.unwrap_or(20),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateJobStatusDto {
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_is_kept_to_cents() {
        let dto = CreateJobDto {
            title: "Tile the floor".to_string(),
            description: "Bathroom".to_string(),
            cost: 150.5,
            address: None,
            location_id: None,
            service_ids: vec![],
        };
        assert!(dto.validate().is_ok());

        let job = dto.into_new_job(Uuid::new_v4()).unwrap();
        assert_eq!(job.cost.to_string(), "150.50");
    }

    #[test]
    fn status_uses_screaming_case_on_the_wire() {
        let dto: UpdateJobStatusDto = serde_json::from_str(r#"{"status":"ON_CONFIRMATION"}"#).unwrap();
        assert_eq!(dto.status, JobStatus::OnConfirmation);
    }
}
