use std::sync::Arc;

use axum::{
    extract::Path,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::{notificationdb::NotificationExt, taxonomydb::TaxonomyExt, userdb::UserExt},
    dtos::{
        userdtos::{
            FilterUserDto, ProfileDto, PublicUserDto, RegisterDeviceDto, Response, SetLocationsDto,
            SetServicesDto, UpdateProfileDto, UploadAvatarDto, UserData, UserResponseDto,
        },
        ApiResponse,
    },
    error::{ErrorMessage, HttpError},
    handler::auth::map_user_write_error,
    middleware::JWTAuthMiddeware,
    service::storage::avatar_key,
    AppState,
};

const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me).put(update_me).delete(delete_me))
        .route("/me/locations", put(set_locations))
        .route("/me/services", put(set_services))
        .route("/me/avatar", post(upload_avatar).delete(delete_avatar))
        .route("/me/devices", post(register_device))
        .route("/:user_id", get(get_user))
        .route("/:user_id/rates", get(get_user_rates))
}

fn user_response(user: &crate::models::usermodel::User) -> Json<UserResponseDto> {
    Json(UserResponseDto {
        status: "success".to_string(),
        data: UserData {
            user: FilterUserDto::filter_user(user),
        },
    })
}

pub async fn get_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let location_ids = app_state.db_client
        .get_user_location_ids(auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;
    let service_ids = app_state.db_client
        .get_user_service_ids(auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(ApiResponse::success(
        "Profile retrieved successfully",
        ProfileDto {
            user: FilterUserDto::filter_user(&auth.user),
            location_ids,
            service_ids,
        },
    )))
}

pub async fn update_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<UpdateProfileDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let email = body.email.map(|e| e.trim().to_lowercase());
    if let Some(email) = &email {
        let owner = app_state.db_client
            .get_user(None, Some(email), None)
            .await
            .map_err(|e| HttpError::server_error(e.to_string()))?;
        if owner.is_some_and(|u| u.id != auth.user.id) {
            return Err(HttpError::unique_constraint_violation(ErrorMessage::EmailOrPhoneExist.to_string()));
        }
    }
    if let Some(phone) = &body.phone {
        let owner = app_state.db_client
            .get_user(None, None, Some(phone))
            .await
            .map_err(|e| HttpError::server_error(e.to_string()))?;
        if owner.is_some_and(|u| u.id != auth.user.id) {
            return Err(HttpError::unique_constraint_violation(ErrorMessage::EmailOrPhoneExist.to_string()));
        }
    }

    let user = app_state.db_client
        .update_user_profile(auth.user.id, body.name, email, body.phone)
        .await
        .map_err(map_user_write_error)?;

    Ok(user_response(&user))
}

pub async fn delete_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    app_state.db_client
        .soft_delete_user(auth.user.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    if let Some(key) = &auth.user.avatar_key {
        if let Err(e) = app_state.storage.delete(key).await {
            tracing::error!("failed to remove avatar of deleted user {}: {}", auth.user.id, e);
        }
    }

    tracing::info!("user {} deleted their account", auth.user.id);

    Ok(Json(Response {
        status: "success",
        message: "Account deleted".to_string(),
    }))
}

pub async fn set_locations(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<SetLocationsDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let found = app_state.db_client
        .get_existing_location_ids(&body.location_ids)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;
    if let Some(missing) = body.location_ids.iter().find(|id| !found.contains(id)) {
        return Err(HttpError::not_found(format!("Location {} not found", missing)));
    }

    app_state.db_client
        .set_user_locations(auth.user.id, &body.location_ids)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(ApiResponse::success("Locations updated", body.location_ids)))
}

pub async fn set_services(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<SetServicesDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let found = app_state.db_client
        .get_existing_service_ids(&body.service_ids)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;
    if let Some(missing) = body.service_ids.iter().find(|id| !found.contains(id)) {
        return Err(HttpError::not_found(format!("Service {} not found", missing)));
    }

    app_state.db_client
        .set_user_services(auth.user.id, &body.service_ids)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(ApiResponse::success("Services updated", body.service_ids)))
}

pub async fn upload_avatar(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<UploadAvatarDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let bytes = STANDARD
        .decode(body.image.as_bytes())
        .map_err(|_| HttpError::bad_request("Image must be base64 encoded"))?;
    if bytes.len() > MAX_AVATAR_BYTES {
        return Err(HttpError::bad_request("Image must not exceed 5MB"));
    }

    let key = avatar_key(&bytes, body.extension());
    let url = app_state.storage
        .upload(&bytes, &key)
        .await
        .map_err(|e| {
            tracing::error!("avatar upload for {} failed: {}", auth.user.id, e);
            HttpError::server_error("Could not store the image")
        })?;

    let user = app_state.db_client
        .update_user_avatar(auth.user.id, Some(key.clone()), Some(url))
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    if let Some(previous) = auth.user.avatar_key.filter(|previous| *previous != key) {
        if let Err(e) = app_state.storage.delete(&previous).await {
            tracing::warn!("failed to remove previous avatar {}: {}", previous, e);
        }
    }

    Ok(user_response(&user))
}

pub async fn delete_avatar(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
) -> Result<impl IntoResponse, HttpError> {
    let Some(key) = auth.user.avatar_key.clone() else {
        return Ok(user_response(&auth.user));
    };

    app_state.storage
        .delete(&key)
        .await
        .map_err(|e| {
            tracing::error!("avatar removal for {} failed: {}", auth.user.id, e);
            HttpError::server_error("Could not remove the image")
        })?;

    let user = app_state.db_client
        .update_user_avatar(auth.user.id, None, None)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(user_response(&user))
}

pub async fn register_device(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<JWTAuthMiddeware>,
    Json(body): Json<RegisterDeviceDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let device = app_state.db_client
        .register_device(auth.user.id, body.push_token.trim(), body.platform)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Device registered", device)),
    ))
}

pub async fn get_user(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let user = app_state.db_client
        .get_user(Some(user_id), None, None)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?
        .ok_or_else(|| HttpError::not_found(format!("User {} not found", user_id)))?;

    Ok(Json(ApiResponse::success("User retrieved successfully", PublicUserDto::from_user(&user))))
}

pub async fn get_user_rates(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let rates = app_state.rating_service.list_received_rates(user_id).await?;

    Ok(Json(ApiResponse::success("Rates retrieved successfully", rates)))
}
