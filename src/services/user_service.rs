use crate::auth::{TokenError, TokenService};
use crate::error::AppError;
use crate::models::{CompanyData, CompanyProfile, PersonalData, Role, User, UserStatus};
use crate::repositories::user_repository::{NewUser, RepositoryError, UserRepository};
use crate::services::email_service::EmailService;
use crate::services::upload_service::{UploadError, UploadService};
use crate::validation;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("The email is not valid")]
    InvalidEmail,
    #[error("The password must be at least 8 characters")]
    WeakPassword,
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("User not found")]
    UserNotFound,
    #[error("Email is already registered")]
    EmailTaken,
    #[error("Invalid verification code")]
    InvalidVerificationCode,
    #[error("Incorrect code or invalid user")]
    InvalidRecoveryCode,
    #[error("{0}")]
    InvalidProfile(String),
    #[error("All company fields are required")]
    IncompleteCompany,
    #[error("The CIF is not in a valid format")]
    InvalidCif,
    #[error("No file uploaded")]
    MissingFile,
    #[error("Password hashing failed: {0}")]
    HashingError(String),
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
    #[error("Repository error: {0}")]
    RepositoryError(#[from] RepositoryError),
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::UserNotFound | UserServiceError::InvalidVerificationCode => {
                AppError::NotFound(err.to_string())
            }
            UserServiceError::EmailTaken => AppError::Conflict(err.to_string()),
            UserServiceError::InvalidEmail
            | UserServiceError::WeakPassword
            | UserServiceError::PasswordMismatch
            | UserServiceError::InvalidRecoveryCode
            | UserServiceError::InvalidProfile(_)
            | UserServiceError::IncompleteCompany
            | UserServiceError::InvalidCif
            | UserServiceError::MissingFile => AppError::Validation(err.to_string()),
            UserServiceError::Upload(e) => e.into(),
            UserServiceError::RepositoryError(RepositoryError::Database(e)) => e.into(),
            UserServiceError::RepositoryError(RepositoryError::NotFound) => {
                AppError::NotFound("User not found".to_string())
            }
            UserServiceError::RepositoryError(RepositoryError::AlreadyExists) => {
                AppError::Conflict("Email is already registered".to_string())
            }
            UserServiceError::HashingError(_) | UserServiceError::Token(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

/// Used by the CLI, where accounts are created already verified.
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub password_confirm: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
}

/// Result of a company update: the profile and a token carrying the new company id.
#[derive(Debug)]
pub struct CompanyUpdate {
    pub user: User,
    pub token: String,
}

pub struct UserService {
    repository: Arc<dyn UserRepository>,
    tokens: Arc<TokenService>,
    email: Arc<dyn EmailService>,
    uploader: Arc<dyn UploadService>,
    expose_codes: bool,
}

impl UserService {
    pub fn new(
        repository: Arc<dyn UserRepository>,
        tokens: Arc<TokenService>,
        email: Arc<dyn EmailService>,
        uploader: Arc<dyn UploadService>,
        expose_codes: bool,
    ) -> Self {
        Self {
            repository,
            tokens,
            email,
            uploader,
            expose_codes,
        }
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Registration, UserServiceError> {
        let email = email.trim().to_lowercase();
        self.validate_email(&email)?;
        self.validate_password(password)?;

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(UserServiceError::EmailTaken);
        }

        let code = generate_code();
        let user = self
            .store(NewUser {
                email,
                password_hash: self.hash_password(password)?,
                verification_code: Some(code.clone()),
                role: Role::User,
                status: UserStatus::Pending,
                invited_by: None,
                company_id: None,
            })
            .await?;

        if let Err(e) = self.email.send_verification_code(&user.email, &code).await {
            tracing::warn!(user_id = user.id, error = %e, "Failed to send verification code");
        }

        tracing::info!(user_id = user.id, "Registered user");
        Ok(Registration {
            token: self.tokens.issue(&user)?,
            email: user.email,
            verification_code: self.expose_codes.then_some(code),
        })
    }

    /// Marks the account verified when `code` matches the one issued at registration.
    pub async fn verify(&self, email: &str, code: &str) -> Result<(), UserServiceError> {
        let user = self
            .repository
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .filter(|user| !code.is_empty() && user.verification_code.as_deref() == Some(code))
            .ok_or(UserServiceError::InvalidVerificationCode)?;

        self.repository.mark_verified(user.id).await?;
        tracing::info!(user_id = user.id, "Verified user");
        Ok(())
    }

    pub async fn update_personal_data(
        &self,
        user_id: i64,
        data: PersonalData,
    ) -> Result<User, UserServiceError> {
        let data = PersonalData {
            first_name: data.first_name.trim().to_string(),
            last_name: data.last_name.trim().to_string(),
            nif: data.nif.trim().to_string(),
        };

        if data.first_name.is_empty() || data.last_name.is_empty() {
            return Err(UserServiceError::InvalidProfile(
                "First name and last name are required".to_string(),
            ));
        }
        if !validation::is_valid_nif(&data.nif) {
            return Err(UserServiceError::InvalidProfile(
                "The NIF is not in a valid format".to_string(),
            ));
        }

        self.not_found_as_user(self.repository.update_personal_data(user_id, data).await)
    }

    /// Writes the company section and re-issues the caller's token with the new company id.
    pub async fn update_company(
        &self,
        user_id: i64,
        data: CompanyData,
    ) -> Result<CompanyUpdate, UserServiceError> {
        let user = self.me(user_id).await?;
        let profile = company_profile(&user, data)?;

        let user = self.not_found_as_user(self.repository.update_company(user_id, profile).await)?;
        tracing::info!(user_id, company = ?user.company_id, "Updated company profile");

        Ok(CompanyUpdate {
            token: self.tokens.issue(&user)?,
            user,
        })
    }

    pub async fn me(&self, user_id: i64) -> Result<User, UserServiceError> {
        self.repository
            .find_by_id(user_id)
            .await?
            .ok_or(UserServiceError::UserNotFound)
    }

    pub async fn upload_logo(
        &self,
        user_id: i64,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<User, UserServiceError> {
        if bytes.is_empty() {
            return Err(UserServiceError::MissingFile);
        }
        self.me(user_id).await?;

        let uploaded = self.uploader.upload(bytes, file_name).await?;
        self.not_found_as_user(self.repository.update_logo(user_id, &uploaded.url).await)
    }

    /// Hard-deletes the account, or only flips it to inactive when `soft` is set.
    pub async fn delete_account(&self, user_id: i64, soft: bool) -> Result<(), UserServiceError> {
        if soft {
            self.not_found_as_user(
                self.repository
                    .set_status(user_id, UserStatus::Inactive)
                    .await,
            )?;
            tracing::info!(user_id, "Deactivated user");
        } else {
            self.delete_user(user_id).await?;
            tracing::info!(user_id, "Deleted user");
        }
        Ok(())
    }

    /// Issues a recovery code; the code is only returned when codes are exposed.
    pub async fn start_recovery(&self, email: &str) -> Result<Option<String>, UserServiceError> {
        let user = self
            .repository
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .ok_or(UserServiceError::UserNotFound)?;

        let code = generate_code();
        self.repository
            .set_recovery_code(user.id, Some(code.clone()))
            .await?;

        if let Err(e) = self.email.send_recovery_code(&user.email, &code).await {
            tracing::warn!(user_id = user.id, error = %e, "Failed to send recovery code");
        }

        Ok(self.expose_codes.then_some(code))
    }

    pub async fn reset_password(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let user = self
            .repository
            .find_by_email(&email.trim().to_lowercase())
            .await?
            .filter(|user| !code.is_empty() && user.recovery_code.as_deref() == Some(code))
            .ok_or(UserServiceError::InvalidRecoveryCode)?;

        self.validate_password(new_password)?;
        let password_hash = self.hash_password(new_password)?;
        self.repository.update_password(user.id, &password_hash).await?;

        tracing::info!(user_id = user.id, "Password reset");
        Ok(())
    }

    /// Creates a pending guest account in the inviter's company.
    pub async fn invite(&self, inviter_id: i64, email: &str) -> Result<User, UserServiceError> {
        let email = email.trim().to_lowercase();
        self.validate_email(&email)?;

        let inviter = self.me(inviter_id).await?;
        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(UserServiceError::EmailTaken);
        }

        // Guests cannot log in until they reset this random password
        let placeholder: [u8; 24] = rand::thread_rng().gen();
        let guest = self
            .store(NewUser {
                email,
                password_hash: self.hash_password(&hex::encode(placeholder))?,
                verification_code: None,
                role: Role::Guest,
                status: UserStatus::Pending,
                invited_by: Some(inviter.id),
                company_id: inviter.company_id.clone(),
            })
            .await?;

        if let Err(e) = self.email.send_invitation(&guest.email, &inviter.email).await {
            tracing::warn!(user_id = guest.id, error = %e, "Failed to send invitation");
        }

        tracing::info!(guest_id = guest.id, inviter_id, "Invited guest");
        Ok(guest)
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<User, UserServiceError> {
        let email = request.email.trim().to_lowercase();
        self.validate_email(&email)?;

        if let Some(ref confirm) = request.password_confirm {
            if request.password != *confirm {
                return Err(UserServiceError::PasswordMismatch);
            }
        }
        self.validate_password(&request.password)?;

        let (verification_code, status) = if request.email_verified {
            (None, UserStatus::Active)
        } else {
            (Some(generate_code()), UserStatus::Pending)
        };

        let user = self
            .store(NewUser {
                email,
                password_hash: self.hash_password(&request.password)?,
                verification_code,
                role: Role::User,
                status,
                invited_by: None,
                company_id: None,
            })
            .await?;

        if request.email_verified {
            self.repository.mark_verified(user.id).await?;
            return self.me(user.id).await;
        }
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self.repository.find_by_email(email).await?)
    }

    pub async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<User>, UserServiceError> {
        Ok(self.repository.list_users(limit, offset).await?)
    }

    pub async fn delete_user(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.delete_user(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn verify_user_email(&self, id: i64) -> Result<(), UserServiceError> {
        match self.repository.mark_verified(id).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub async fn set_password(&self, id: i64, password: &str) -> Result<(), UserServiceError> {
        self.validate_password(password)?;
        let password_hash = self.hash_password(password)?;

        match self.repository.update_password(id, &password_hash).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    pub fn issue_token(&self, user: &User) -> Result<String, UserServiceError> {
        Ok(self.tokens.issue(user)?)
    }

    async fn store(&self, user: NewUser) -> Result<User, UserServiceError> {
        match self.repository.create_user(user).await {
            Ok(user) => Ok(user),
            Err(RepositoryError::AlreadyExists) => Err(UserServiceError::EmailTaken),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    fn not_found_as_user<T>(
        &self,
        result: Result<T, RepositoryError>,
    ) -> Result<T, UserServiceError> {
        match result {
            Ok(value) => Ok(value),
            Err(RepositoryError::NotFound) => Err(UserServiceError::UserNotFound),
            Err(e) => Err(UserServiceError::RepositoryError(e)),
        }
    }

    fn validate_email(&self, email: &str) -> Result<(), UserServiceError> {
        if !validation::is_valid_email(email) {
            return Err(UserServiceError::InvalidEmail);
        }
        Ok(())
    }

    fn validate_password(&self, password: &str) -> Result<(), UserServiceError> {
        if password.len() < 8 {
            return Err(UserServiceError::WeakPassword);
        }
        Ok(())
    }

    fn hash_password(&self, password: &str) -> Result<String, UserServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserServiceError::HashingError(e.to_string()))
    }

    pub fn verify_password(&self, password: &str, password_hash: &str) -> bool {
        if let Ok(parsed_hash) = PasswordHash::new(password_hash) {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed_hash)
                .is_ok()
        } else {
            false
        }
    }
}

/// Six-digit numeric code used for verification and recovery.
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// Builds the stored company section for `user` from the submitted form.
///
/// Autonomous users act as their own company: name, tax id and address are
/// derived from the personal data captured during onboarding.
fn company_profile(user: &User, data: CompanyData) -> Result<CompanyProfile, UserServiceError> {
    if data.is_autonomous {
        let (first, last, nif) = match (&user.first_name, &user.last_name, &user.nif) {
            (Some(first), Some(last), Some(nif)) => (first, last, nif),
            _ => {
                return Err(UserServiceError::InvalidProfile(
                    "Complete your personal data before registering as autonomous".to_string(),
                ))
            }
        };

        return Ok(CompanyProfile {
            is_autonomous: true,
            name: format!("{} {}", first, last),
            cif: nif.clone(),
            address: format!("{} {} Address", first, last),
            ..Default::default()
        });
    }

    let required = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let (Some(name), Some(cif), Some(address), Some(street), Some(number), Some(postal), Some(city), Some(province)) = (
        required(data.company_name),
        required(data.company_cif),
        required(data.company_address),
        required(data.company_street),
        data.company_number,
        data.company_postal,
        required(data.company_city),
        required(data.company_province),
    ) else {
        return Err(UserServiceError::IncompleteCompany);
    };

    if !validation::is_valid_cif(&cif) {
        return Err(UserServiceError::InvalidCif);
    }

    Ok(CompanyProfile {
        is_autonomous: false,
        name,
        cif,
        address,
        street: Some(street),
        number: Some(number),
        postal: Some(postal),
        city: Some(city),
        province: Some(province),
    })
}
