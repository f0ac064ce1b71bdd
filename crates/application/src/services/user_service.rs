use std::sync::Arc;

use domain::{DomainError, NewUser, RepositoryError, User, UserEmail, UserId, Username};

use crate::{error::ApplicationError, password::PasswordHasher, repository::UserRepository};

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateUserRequest {
    pub email: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
    pub password_hasher: Arc<dyn PasswordHasher>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApplicationError> {
        let username = Username::parse(request.username)?;
        let email = UserEmail::parse(request.email)?;
        if request.password.is_empty() {
            return Err(DomainError::invalid_argument("password", "cannot be empty").into());
        }

        if self
            .deps
            .user_repository
            .find_by_email(email.clone())
            .await?
            .is_some()
        {
            return Err(ApplicationError::UserAlreadyExists);
        }

        let password = self.deps.password_hasher.hash(&request.password).await?;

        // 并发注册同一邮箱时由唯一约束兜底
        let user = self
            .deps
            .user_repository
            .create(NewUser {
                username,
                email,
                password,
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict => ApplicationError::UserAlreadyExists,
                other => other.into(),
            })?;

        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn authenticate(
        &self,
        request: AuthenticateUserRequest,
    ) -> Result<User, ApplicationError> {
        let email =
            UserEmail::parse(request.email).map_err(|_| ApplicationError::InvalidCredentials)?;
        let user = self
            .deps
            .user_repository
            .find_by_email(email)
            .await?
            .ok_or(ApplicationError::InvalidCredentials)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            tracing::warn!(user_id = %user.id, "login rejected: wrong password");
            return Err(ApplicationError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn find_by_id(&self, id: UserId) -> Result<User, ApplicationError> {
        self.deps
            .user_repository
            .find_by_id(id)
            .await?
            .ok_or(ApplicationError::NotFound)
    }
}
