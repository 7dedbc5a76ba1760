use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::jobmodel::{ApplicationStatus, ApplicationType};

fn validate_invite_target(dto: &CreateApplicationDto) -> Result<(), ValidationError> {
    if dto.application_type == ApplicationType::Invite && dto.worker_id.is_none() {
        let mut error = ValidationError::new("missing_worker");
        error.message = Some("An invitation needs a worker_id".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_invite_target"))]
pub struct CreateApplicationDto {
    #[serde(rename = "type")]
    pub application_type: ApplicationType,
    pub job_id: Uuid,
    /// Required for INVITE; for APPLY it defaults to the caller.
    pub worker_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateApplicationDto {
    pub status: ApplicationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dto(application_type: ApplicationType, worker_id: Option<Uuid>) -> CreateApplicationDto {
        CreateApplicationDto {
            application_type,
            job_id: Uuid::new_v4(),
            worker_id,
        }
    }

    #[test]
    fn an_invitation_names_its_worker() {
        assert!(dto(ApplicationType::Invite, None).validate().is_err());
        assert!(dto(ApplicationType::Invite, Some(Uuid::new_v4())).validate().is_ok());
        assert!(dto(ApplicationType::Apply, None).validate().is_ok());
    }
}
