use crate::models::{CompanyProfile, PersonalData, Role, User, UserStatus};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

const USER_COLUMNS: &str = r#"
    id, email, password_hash, verification_code, is_verified,
    first_name, last_name, nif, is_autonomous,
    company_name, company_cif, company_address, company_street, company_number,
    company_postal, company_city, company_province, company_id,
    logo, recovery_code, status, role, invited_by, created_at, updated_at
"#;

/// Fields written when an account is first stored.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub verification_code: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub invited_by: Option<i64>,
    pub company_id: Option<String>,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn mark_verified(&self, id: i64) -> RepositoryResult<()>;
    async fn update_personal_data(&self, id: i64, data: PersonalData) -> RepositoryResult<User>;
    /// Writes the company section and derives `company_id` from its CIF.
    async fn update_company(&self, id: i64, profile: CompanyProfile) -> RepositoryResult<User>;
    async fn update_logo(&self, id: i64, logo_url: &str) -> RepositoryResult<User>;
    async fn set_status(&self, id: i64, status: UserStatus) -> RepositoryResult<User>;
    async fn set_recovery_code(&self, id: i64, code: Option<String>) -> RepositoryResult<()>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()>;
    async fn delete_user(&self, id: i64) -> RepositoryResult<()>;
    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn require(&self, id: i64) -> RepositoryResult<User> {
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }
}

fn ensure_affected(rows: u64) -> RepositoryResult<()> {
    if rows == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn create_user(&self, user: NewUser) -> RepositoryResult<User> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO users
                (email, password_hash, verification_code, role, status, invited_by, company_id,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.verification_code)
        .bind(user.role)
        .bind(user.status)
        .bind(user.invited_by)
        .bind(&user.company_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => self.require(res.last_insert_rowid()).await,
            Err(e) => {
                if super::is_unique_violation(&e) {
                    Err(RepositoryError::AlreadyExists)
                } else {
                    Err(RepositoryError::Database(e))
                }
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = ?",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = ?",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn mark_verified(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = 1, verification_code = NULL, status = 'active', updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected())
    }

    async fn update_personal_data(&self, id: i64, data: PersonalData) -> RepositoryResult<User> {
        let result = sqlx::query(
            "UPDATE users SET first_name = ?, last_name = ?, nif = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&data.first_name)
        .bind(&data.last_name)
        .bind(&data.nif)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected())?;
        self.require(id).await
    }

    async fn update_company(&self, id: i64, profile: CompanyProfile) -> RepositoryResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_autonomous = ?, company_name = ?, company_cif = ?, company_address = ?,
                company_street = ?, company_number = ?, company_postal = ?, company_city = ?,
                company_province = ?, company_id = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(profile.is_autonomous)
        .bind(&profile.name)
        .bind(&profile.cif)
        .bind(&profile.address)
        .bind(&profile.street)
        .bind(profile.number)
        .bind(profile.postal)
        .bind(&profile.city)
        .bind(&profile.province)
        .bind(&profile.cif)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected())?;
        self.require(id).await
    }

    async fn update_logo(&self, id: i64, logo_url: &str) -> RepositoryResult<User> {
        let result = sqlx::query("UPDATE users SET logo = ?, updated_at = ? WHERE id = ?")
            .bind(logo_url)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_affected(result.rows_affected())?;
        self.require(id).await
    }

    async fn set_status(&self, id: i64, status: UserStatus) -> RepositoryResult<User> {
        let result = sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_affected(result.rows_affected())?;
        self.require(id).await
    }

    async fn set_recovery_code(&self, id: i64, code: Option<String>) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET recovery_code = ?, updated_at = ? WHERE id = ?")
            .bind(code)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_affected(result.rows_affected())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, recovery_code = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        ensure_affected(result.rows_affected())
    }

    async fn delete_user(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        ensure_affected(result.rows_affected())
    }

    async fn list_users(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> RepositoryResult<Vec<User>> {
        let limit = limit.unwrap_or(100);
        let offset = offset.unwrap_or(0);

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users ORDER BY created_at DESC LIMIT ? OFFSET ?",
            USER_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_pool;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "hash".to_string(),
            verification_code: Some("123456".to_string()),
            role: Role::User,
            status: UserStatus::Pending,
            invited_by: None,
            company_id: None,
        }
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let pool = create_test_pool().await;
        let repo = SqliteUserRepository::new(pool);

        let user = repo.create_user(new_user("life@example.com")).await.unwrap();
        assert_eq!(user.status, UserStatus::Pending);
        assert!(!user.is_verified);

        // Duplicate email
        let duplicate = repo.create_user(new_user("life@example.com")).await;
        assert!(matches!(duplicate, Err(RepositoryError::AlreadyExists)));

        repo.mark_verified(user.id).await.unwrap();
        let verified = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(verified.is_verified);
        assert_eq!(verified.status, UserStatus::Active);
        assert!(verified.verification_code.is_none());

        let profile = CompanyProfile {
            is_autonomous: false,
            name: "Acme SL".to_string(),
            cif: "B12345678".to_string(),
            address: "Main St".to_string(),
            ..Default::default()
        };
        let updated = repo.update_company(user.id, profile).await.unwrap();
        assert_eq!(updated.company_id.as_deref(), Some("B12345678"));

        let inactive = repo.set_status(user.id, UserStatus::Inactive).await.unwrap();
        assert_eq!(inactive.status, UserStatus::Inactive);

        repo.delete_user(user.id).await.unwrap();
        assert!(repo.find_by_id(user.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete_user(user.id).await,
            Err(RepositoryError::NotFound)
        ));
    }
}
