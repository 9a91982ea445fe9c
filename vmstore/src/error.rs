use sea_orm::DbErr;
use thiserror::Error;

use crate::naming::Collision;

/// Failure taxonomy of the lifecycle core. Every variant carries enough
/// context for the API layer to render a precise message; nothing is
/// retried internally.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing/invalid field, update of an approved template, blocked
    /// self-deletion.
    #[error("{0}")]
    Validation(String),
    /// Referenced row does not exist or is soft-deleted.
    #[error("{0} not found")]
    NotFound(String),
    /// Template name collides with an existing name or the reserved
    /// version-suffix grammar.
    #[error("{0}")]
    Collision(Collision),
    /// Authenticated identity lacks the required access level. Distinct
    /// from "no identity at all", which is rejected upstream as 401.
    #[error("{0}")]
    Forbidden(String),
    #[error("database error: {0}")]
    Db(#[from] DbErr),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
