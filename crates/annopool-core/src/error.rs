use thiserror::Error;

use crate::domain::UnitId;
use crate::pool::SkeletonError;
use crate::ports::LogError;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unit {0} was never in the skeleton")]
    UnknownUnit(UnitId),

    #[error("object {category}/{object_id} was never in the skeleton")]
    UnknownObject { category: String, object_id: String },

    #[error("skeleton unavailable: {0}")]
    SkeletonUnavailable(#[from] SkeletonError),

    /// The pool was already mutated; only the durable record is missing.
    #[error("event log write failed: {0}")]
    LogWrite(#[from] LogError),

    #[error("event log replay failed: {0}")]
    LogReplay(#[source] LogError),

    #[error("coordinator is shut down")]
    ShutDown,
}

impl PoolError {
    /// Bad input from the caller, as opposed to a server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownUnit(_) | Self::UnknownObject { .. })
    }
}
