//! Error types for the sapds-force crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForceError {
    #[error("OData error: {0}")]
    OData(#[from] sapds_odata::ODataError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, ForceError>;
