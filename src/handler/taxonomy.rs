use std::sync::Arc;

use axum::{extract::Path, response::IntoResponse, routing::get, Extension, Json, Router};
use uuid::Uuid;

use crate::{db::taxonomydb::TaxonomyExt, dtos::ApiResponse, error::HttpError, AppState};

pub fn taxonomy_handler() -> Router {
    Router::new()
        .route("/services", get(list_services))
        .route("/services/:service_id/path", get(get_service_path))
        .route("/locations", get(list_locations))
}

pub async fn list_services(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let services = app_state.db_client
        .get_services()
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(ApiResponse::success("Services retrieved successfully", services)))
}

/// Root first, ending with the requested service.
pub async fn get_service_path(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(service_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let path = app_state.db_client
        .get_service_path(service_id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    if path.is_empty() {
        return Err(HttpError::not_found(format!("Service {} not found", service_id)));
    }

    Ok(Json(ApiResponse::success("Service path retrieved successfully", path)))
}

pub async fn list_locations(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let locations = app_state.db_client
        .get_locations()
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(ApiResponse::success("Locations retrieved successfully", locations)))
}
