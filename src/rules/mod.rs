//! Domain rules evaluated over already-loaded entities.
//!
//! Nothing in here touches the database; the services load what a rule
//! needs, call it, and only then start writing.

pub mod application;
pub mod audience;
pub mod job;
pub mod rating;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{0}")]
    Validation(String),
}
