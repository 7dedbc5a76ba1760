use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, routing::post, Extension, Json, Router};
use validator::Validate;

use crate::{
    dtos::{ratedtos::CreateRateDto, ApiResponse},
    error::HttpError,
    middleware::JWTAuthMiddeware,
    AppState,
};

pub fn rates_handler() -> Router {
    Router::new().route("/", post(create_rate))
}

pub async fn create_rate(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<CreateRateDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let rate = app_state
        .rating_service
        .create_rate(auth.user.id, body.job_id, body.receiver_id, body.rate, body.review)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Rate submitted successfully", rate)),
    ))
}
