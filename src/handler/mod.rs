pub mod admin;
pub mod applications;
pub mod auth;
pub mod jobs;
pub mod notifications;
pub mod rates;
pub mod taxonomy;
pub mod users;
