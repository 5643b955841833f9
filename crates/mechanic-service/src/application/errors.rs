use thiserror::Error;

use crate::core::ports::StoreError;

#[derive(Debug, Error)]
pub enum MechanicError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Storage(StoreError),
}

impl From<StoreError> for MechanicError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => MechanicError::NotFound,
            other => MechanicError::Storage(other),
        }
    }
}
