use thiserror::Error;

use outfitter_core::errors::ApplicationError;

pub mod catalog;
pub mod user;

pub use catalog::SqlCatalogRepository;
pub use user::SqlUserProfileRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        Self::Persistence(error.to_string())
    }
}

fn decode_json<T: serde::de::DeserializeOwned>(
    column: &str,
    raw: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_str(raw)
        .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
}

fn encode_json<T: serde::Serialize + ?Sized>(
    column: &str,
    value: &T,
) -> Result<String, RepositoryError> {
    serde_json::to_string(value)
        .map_err(|error| RepositoryError::Decode(format!("column `{column}`: {error}")))
}
