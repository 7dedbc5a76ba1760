use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::usermodel::User;

fn phone_pattern() -> &'static Regex {
    static PHONE: OnceLock<Regex> = OnceLock::new();
    PHONE.get_or_init(|| Regex::new(r"^\+?[0-9]{7,15}$").expect("phone pattern compiles"))
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone_pattern().is_match(phone) {
        Ok(())
    } else {
        let mut error = ValidationError::new("invalid_phone");
        error.message = Some("Phone number is invalid".into());
        Err(error)
    }
}

fn validate_contact(dto: &RegisterUserDto) -> Result<(), ValidationError> {
    if dto.email.is_none() && dto.phone.is_none() {
        let mut error = ValidationError::new("missing_contact");
        error.message = Some("Email or phone is required".into());
        return Err(error);
    }
    Ok(())
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
#[validate(schema(function = "validate_contact", skip_on_field_errors = false))]
pub struct RegisterUserDto {
    #[validate(length(min = 1, max = 100, message = "Name is required"))]
    pub name: String,

    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,

    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,

    #[validate(
        length(min = 1, message = "Password is required"),
        length(min = 6, message = "Password must be at least 6 characters")
    )]
    pub password: String,

    #[validate(
        length(min = 1, message = "Confirm Password is required"),
        must_match(other = "password", message = "passwords do not match")
    )]
    #[serde(rename = "passwordConfirm")]
    pub password_confirm: String,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginUserDto {
    /// Email or phone number.
    #[validate(length(min = 1, message = "Email or phone is required"))]
    pub login: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct OAuthLoginDto {
    #[validate(length(min = 1, message = "id_token is required"))]
    pub id_token: String,
    /// Apple only sends the name on the first sign-in, through the client.
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
}

#[derive(Validate, Debug, Default, Clone, Serialize, Deserialize)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 100, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[validate(custom = "validate_phone")]
    pub phone: Option<String>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct SetLocationsDto {
    #[validate(length(max = 50, message = "Too many locations"))]
    pub location_ids: Vec<Uuid>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct SetServicesDto {
    #[validate(length(max = 50, message = "Too many services"))]
    pub service_ids: Vec<Uuid>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct UploadAvatarDto {
    /// Base64 encoded image.
    #[validate(length(min = 1, message = "Image is required"))]
    pub image: String,
    #[validate(custom = "validate_image_type")]
    pub content_type: String,
}

fn validate_image_type(content_type: &str) -> Result<(), ValidationError> {
    match content_type {
        "image/png" | "image/jpeg" | "image/webp" => Ok(()),
        _ => {
            let mut error = ValidationError::new("invalid_content_type");
            error.message = Some("Unsupported image type".into());
            Err(error)
        }
    }
}

impl UploadAvatarDto {
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDeviceDto {
    #[validate(length(min = 1, max = 255, message = "Push token is required"))]
    pub push_token: String,
    #[validate(length(max = 20))]
    pub platform: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilterUserDto {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: String,
    pub average_rate: f64,
    pub avatar_url: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl FilterUserDto {
    pub fn filter_user(user: &User) -> Self {
        FilterUserDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            email: user.email.to_owned(),
            phone: user.phone.to_owned(),
            role: user.role.to_str().to_string(),
            average_rate: user.average_rate,
            avatar_url: user.avatar_url.clone(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// What other users may see of a profile.
#[derive(Debug, Serialize, Deserialize)]
pub struct PublicUserDto {
    pub id: String,
    pub name: String,
    pub average_rate: f64,
    pub avatar_url: Option<String>,
}

impl PublicUserDto {
    pub fn from_user(user: &User) -> Self {
        PublicUserDto {
            id: user.id.to_string(),
            name: user.name.to_owned(),
            average_rate: user.average_rate,
            avatar_url: user.avatar_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileDto {
    pub user: FilterUserDto,
    pub location_ids: Vec<Uuid>,
    pub service_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserData {
    pub user: FilterUserDto,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponseDto {
    pub status: String,
    pub data: UserData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponseDto {
    pub status: String,
    pub token: String,
    pub user: Option<FilterUserDto>,
}

#[derive(Serialize, Deserialize)]
pub struct Response {
    pub status: &'static str,
    pub message: String,
}
