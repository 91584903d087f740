//! Crate-wide error type.

use crate::ZoneId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedError {
    /// A mode or runtime flag name outside the closed set.
    #[error("unknown flag: {0}")]
    InvalidFlag(String),

    #[error("property not found: {0}")]
    PropertyNotFound(String),

    #[error("property {key} expects a {expected} value")]
    PropertyType { key: String, expected: &'static str },

    /// The zone task stopped while a request was in flight.
    #[error("{0} zone is no longer running")]
    ZoneGone(ZoneId),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
