use thiserror::Error;

use crate::domain::registration::PaymentStatus;

pub type Result<T> = std::result::Result<T, FestError>;

/// Error taxonomy for the registration core.
///
/// Validation and authorization failures are detected before any mutation, so a
/// returned error implies no partial write occurred.
#[derive(Error, Debug)]
pub enum FestError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(String),
    #[error("team is locked")]
    Locked,
    #[error("registration deadline has passed")]
    DeadlinePassed,
    #[error("registration is already checked in")]
    AlreadyCheckedIn,
    #[error("registration is not paid (current status: {status})")]
    Unpaid { status: PaymentStatus },
    #[error("payment gateway error: {0}")]
    Gateway(String),
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}
