use domain::{DomainError, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl ApplicationError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        ApplicationError::Infrastructure(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            // 仓储的 NotFound 对调用方就是资源不存在
            RepositoryError::NotFound => {
                ApplicationError::Domain(DomainError::not_found("record"))
            }
            other => ApplicationError::Repository(other),
        }
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
