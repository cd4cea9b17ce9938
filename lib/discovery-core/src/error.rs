use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("service not found: {name}/{version}")]
    ServiceNotFound { name: String, version: String },

    #[error("invalid path received: {0:?}")]
    InvalidPath(String),
}
