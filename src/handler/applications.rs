use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dtos::{
        applicationdtos::{CreateApplicationDto, UpdateApplicationDto},
        ApiResponse,
    },
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn applications_handler() -> Router {
    Router::new()
        .route("/", post(create_application))
        .route("/:application_id", get(get_application).put(update_application))
}

pub async fn create_application(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateApplicationDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let application = app_state
        .application_service
        .create_application(auth.user.id, body.job_id, body.worker_id, body.application_type)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Application created successfully", application)),
    ))
}

pub async fn get_application(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let application = app_state
        .application_service
        .get_application(auth.user.id, application_id)
        .await?;

    Ok(Json(ApiResponse::success("Application retrieved successfully", application)))
}

pub async fn update_application(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Path(application_id): Path<Uuid>,
    Json(body): Json<UpdateApplicationDto>,
) -> Result<impl IntoResponse, HttpError> {
    let application = app_state
        .application_service
        .update_application_status(auth.user.id, application_id, body.status)
        .await?;

    Ok(Json(ApiResponse::success("Application updated successfully", application)))
}
