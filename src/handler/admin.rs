use std::sync::Arc;

use axum::{middleware, response::IntoResponse, routing::post, Extension, Json, Router};

use crate::{
    dtos::ApiResponse,
    error::HttpError,
    middleware::{role_check, JWTAuthMiddeware},
    models::usermodel::UserRole,
    AppState,
};

pub fn admin_handler() -> Router {
    Router::new().route(
        "/rates/recompute",
        post(recompute_rates).layer(middleware::from_fn(|state, req, next| {
            role_check(state, req, next, vec![UserRole::Admin])
        })),
    )
}

pub async fn recompute_rates(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    tracing::info!("admin {} started average rate recomputation", auth.user.id);

    let summary = app_state.rating_service.recompute_average_rate_for_all().await?;

    Ok(Json(ApiResponse::success("Average rates recomputed", summary)))
}
