//! Engine errors

use hos_store::StoreError;
use thiserror::Error;

/// Errors from the engine.
///
/// Regulatory violations are never errors; they are reported in summaries.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    /// The failure says nothing about the driver's hours: eligibility is unknown
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, CoreError::Store(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
