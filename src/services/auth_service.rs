use crate::auth::{TokenError, TokenService};
use crate::error::AppError;
use crate::models::user::{User, UserStatus};
use crate::repositories::user_repository::{RepositoryError, UserRepository};
use argon2::{password_hash::PasswordHash, Argon2, PasswordVerifier};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum AuthServiceError {
    #[error("User not found")]
    UserNotFound,
    #[error("Incorrect password")]
    IncorrectPassword,
    #[error("Account is inactive")]
    AccountInactive,
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::UserNotFound => AppError::NotFound(err.to_string()),
            AuthServiceError::IncorrectPassword | AuthServiceError::AccountInactive => {
                AppError::Unauthorized(err.to_string())
            }
            AuthServiceError::RepositoryError(RepositoryError::Database(e)) => e.into(),
            AuthServiceError::RepositoryError(_) | AuthServiceError::Token(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub email: String,
    pub is_verified: bool,
    pub token: String,
}

pub struct AuthService {
    user_repository: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(user_repository: Arc<dyn UserRepository>, tokens: Arc<TokenService>) -> Self {
        Self {
            user_repository,
            tokens,
        }
    }

    pub async fn authenticate(&self, request: LoginRequest) -> Result<User, AuthServiceError> {
        let user = self
            .user_repository
            .find_by_email(&request.email.trim().to_lowercase())
            .await?
            .ok_or(AuthServiceError::UserNotFound)?;

        if !self.verify_password(&request.password, &user.password_hash) {
            return Err(AuthServiceError::IncorrectPassword);
        }

        if user.status == UserStatus::Inactive {
            return Err(AuthServiceError::AccountInactive);
        }

        Ok(user)
    }

    /// Authenticates and issues a bearer token for the account.
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthServiceError> {
        let user = self.authenticate(request).await?;
        let token = self.tokens.issue(&user)?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginResponse {
            email: user.email,
            is_verified: user.is_verified,
            token,
        })
    }

    fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok()
        } else {
            false
        }
    }
}
