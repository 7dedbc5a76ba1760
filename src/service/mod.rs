pub mod application_service;
pub mod error;
pub mod job_service;
pub mod notification_service;
pub mod oauth;
pub mod push;
pub mod rating_service;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
