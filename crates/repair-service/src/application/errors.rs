use repair_events::CodecError;
use thiserror::Error;

use crate::core::ports::{RoutingError, StoreError};

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Upstream(#[from] RoutingError),

    #[error("event encoding failed: {0}")]
    Codec(#[from] CodecError),
}
