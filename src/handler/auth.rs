use std::sync::Arc;

use axum::{
    extract::Path,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::Cookie;
use validator::Validate;

use crate::{
    db::userdb::UserExt,
    dtos::userdtos::{AuthResponseDto, FilterUserDto, LoginUserDto, OAuthLoginDto, RegisterUserDto},
    error::{ErrorMessage, HttpError},
    models::usermodel::{NewUser, User},
    service::oauth::{IdTokenVerifier, OAuthError},
    utils::{password, token},
    AppState,
};

pub fn auth_handler() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/oauth/:provider", post(oauth_login))
}

/// Unique violations from a racing registration surface as 409.
pub fn map_user_write_error(e: sqlx::Error) -> HttpError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            HttpError::unique_constraint_violation(ErrorMessage::EmailOrPhoneExist.to_string())
        }
        _ => HttpError::server_error(e.to_string()),
    }
}

fn issue_token(app_state: &AppState, user: &User) -> Result<String, HttpError> {
    token::create_token(
        &user.id.to_string(),
        app_state.env.jwt_secret.as_bytes(),
        app_state.env.jwt_maxage,
    )
    .map_err(|e| HttpError::server_error(e.to_string()))
}

pub async fn register(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RegisterUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let email = body.email.map(|e| e.trim().to_lowercase());

    if let Some(email) = &email {
        let existing = app_state.db_client
            .get_user(None, Some(email), None)
            .await
            .map_err(|e| HttpError::server_error(e.to_string()))?;
        if existing.is_some() {
            return Err(HttpError::unique_constraint_violation(ErrorMessage::EmailOrPhoneExist.to_string()));
        }
    }
    if let Some(phone) = &body.phone {
        let existing = app_state.db_client
            .get_user(None, None, Some(phone))
            .await
            .map_err(|e| HttpError::server_error(e.to_string()))?;
        if existing.is_some() {
            return Err(HttpError::unique_constraint_violation(ErrorMessage::EmailOrPhoneExist.to_string()));
        }
    }

    let hashed_password = password::hash(&body.password)
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let user = app_state.db_client
        .save_user(NewUser {
            name: body.name.trim().to_string(),
            email,
            phone: body.phone,
            password: Some(hashed_password),
            oauth_issuer: None,
        })
        .await
        .map_err(map_user_write_error)?;

    tracing::info!("user {} registered", user.id);

    let token = issue_token(&app_state, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponseDto {
            status: "success".to_string(),
            token,
            user: Some(FilterUserDto::filter_user(&user)),
        }),
    ))
}

pub async fn login(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<LoginUserDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let login = body.login.trim();
    let result = if login.contains('@') {
        app_state.db_client.get_user(None, Some(&login.to_lowercase()), None).await
    } else {
        app_state.db_client.get_user(None, None, Some(login)).await
    }
    .map_err(|e| HttpError::server_error(e.to_string()))?;

    let user = result.ok_or(HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()))?;

    let password_matched = password::compare(&body.password, &user.password)
        .map_err(|_| HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()))?;

    if !password_matched {
        return Err(HttpError::bad_request(ErrorMessage::WrongCredentials.to_string()));
    }

    let token = issue_token(&app_state, &user)?;

    let cookie_duration = time::Duration::minutes(app_state.env.jwt_maxage);
    let cookie = Cookie::build(("token", token.clone()))
        .path("/")
        .max_age(cookie_duration)
        .http_only(true)
        .build();
    let cookie = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let mut response = Json(AuthResponseDto {
        status: "success".to_string(),
        token,
        user: None,
    })
    .into_response();
    response.headers_mut().append(header::SET_COOKIE, cookie);

    Ok(response)
}

pub async fn oauth_login(
    Extension(app_state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(body): Json<OAuthLoginDto>,
) -> Result<impl IntoResponse, HttpError> {
    body.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let verifier: &Arc<dyn IdTokenVerifier> = match provider.as_str() {
        "google" => &app_state.google_verifier,
        "apple" => &app_state.apple_verifier,
        _ => return Err(HttpError::not_found(format!("Unknown OAuth provider {}", provider))),
    };

    let identity = verifier.verify(&body.id_token).await.map_err(|e| match e {
        OAuthError::InvalidToken(_) => HttpError::unauthorized(e.to_string()),
        OAuthError::Disabled => HttpError::not_found(e.to_string()),
        OAuthError::Keys(ref reason) => {
            tracing::error!("{} key fetch failed: {}", provider, reason);
            HttpError::server_error(e.to_string())
        }
    })?;

    let existing = app_state.db_client
        .get_user(None, Some(&identity.email), None)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    let user = match existing {
        Some(user) => user,
        None => {
            let name = body
                .name
                .or(identity.name.clone())
                .unwrap_or_else(|| identity.email.split('@').next().unwrap_or_default().to_string());

            let user = app_state.db_client
                .save_user(NewUser {
                    name,
                    email: Some(identity.email.clone()),
                    phone: None,
                    password: None,
                    oauth_issuer: Some(identity.issuer.clone()),
                })
                .await
                .map_err(map_user_write_error)?;

            tracing::info!("user {} created through {} sign-in", user.id, provider);
            user
        }
    };

    let token = issue_token(&app_state, &user)?;

    Ok(Json(AuthResponseDto {
        status: "success".to_string(),
        token,
        user: Some(FilterUserDto::filter_user(&user)),
    }))
}
