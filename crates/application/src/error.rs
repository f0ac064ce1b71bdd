use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::password::PasswordHasherError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(RepositoryError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    /// 资源不存在，或调用者无权查看（两者对外不可区分）
    #[error("not found")]
    NotFound,
    #[error("user already exists")]
    UserAlreadyExists,
    /// 登录时邮箱不存在或密码错误
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("authentication failed")]
    Authentication,
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound => ApplicationError::NotFound,
            other => ApplicationError::Repository(other),
        }
    }
}
