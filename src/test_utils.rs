use chrono::{TimeZone, Utc};
use std::path::Path;
use std::time::Duration;

use crate::auth::CallerContext;
use crate::config::AppConfig;
use crate::models::{DeliveryNote, LineItem, NoteType, Role, User, UserStatus};

pub mod test_helpers {
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use tempfile::NamedTempFile;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when several connections must observe the same data
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a test user with hashed password
    pub async fn insert_test_user(
        pool: &SqlitePool,
        email: &str,
        password: &str,
        verified: bool,
    ) -> Result<i64, sqlx::Error> {
        use argon2::{
            password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
            Argon2,
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                sqlx::Error::Configuration(format!("Password hashing failed: {}", e).into())
            })?
            .to_string();

        let now = chrono::Utc::now();
        let status = if verified { "active" } else { "pending" };
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, is_verified, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(verified)
        .bind(status)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}

pub use test_helpers::insert_test_user;

// Note: This is test-only code. Panic on error is acceptable in tests.
#[cfg(test)]
pub async fn create_test_pool() -> sqlx::SqlitePool {
    match test_helpers::create_test_db().await {
        Ok(pool) => pool,
        Err(e) => panic!("Failed to create test pool: {}", e),
    }
}

pub fn caller(user_id: i64, company_id: Option<&str>) -> CallerContext {
    CallerContext {
        user_id,
        email: format!("user{}@example.com", user_id),
        company_id: company_id.map(str::to_string),
    }
}

/// A verified, active user with an empty profile.
pub fn sample_user(id: i64, email: &str) -> User {
    let now = Utc::now();
    User {
        id,
        email: email.to_string(),
        password_hash: String::new(),
        verification_code: None,
        is_verified: true,
        first_name: None,
        last_name: None,
        nif: None,
        is_autonomous: false,
        company_name: None,
        company_cif: None,
        company_address: None,
        company_street: None,
        company_number: None,
        company_postal: None,
        company_city: None,
        company_province: None,
        company_id: None,
        logo: None,
        recovery_code: None,
        status: UserStatus::Active,
        role: Role::User,
        invited_by: None,
        created_at: now,
        updated_at: now,
    }
}

/// An unsigned note dated 2025-03-07 whose first item is Ana's 8 hours.
pub fn sample_note(id: i64, created_by: i64) -> DeliveryNote {
    let date = Utc
        .with_ymd_and_hms(2025, 3, 7, 10, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    DeliveryNote {
        id,
        project_id: 1,
        client_id: 1,
        created_by,
        company_id: None,
        note_type: NoteType::Multiple,
        data: vec![
            LineItem::HourBased {
                person: "Ana".to_string(),
                hours: Some(8.0),
            },
            LineItem::MaterialBased {
                material: "Cement".to_string(),
                quantity: Some(12.0),
            },
        ],
        date,
        signed: false,
        signature_url: None,
        pdf_url: None,
        created_at: date,
        updated_at: date,
    }
}

/// PNG signature stroke: opaque black diagonal on a transparent background.
///
/// The top-left pixel is always fully transparent.
pub fn png_signature(width: u32, height: u32) -> Vec<u8> {
    let canvas = image::RgbaImage::from_fn(width, height, |x, y| {
        let on_stroke = x > 0 && y > 0 && (x * height / width.max(1)).abs_diff(y) <= 1;
        if on_stroke {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([0, 0, 0, 0])
        }
    });

    let mut bytes = std::io::Cursor::new(Vec::new());
    match canvas.write_to(&mut bytes, image::ImageFormat::Png) {
        Ok(()) => bytes.into_inner(),
        Err(e) => panic!("Failed to encode test signature: {}", e),
    }
}

/// Configuration for tests: local uploads and temp files under `dir`, codes exposed.
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        host: "127.0.0.1".to_string(),
        port: 3000,
        environment: "test".to_string(),
        jwt_secret: "integration-test-secret-0123456789abcdef".to_string(),
        token_ttl: Duration::from_secs(3600),
        public_base_url: "http://localhost:3000".to_string(),
        upload_dir: dir.join("uploads"),
        temp_dir: dir.join("tmp"),
        outbound_timeout: Duration::from_secs(5),
        max_upload_bytes: 5 * 1024 * 1024,
        pinata: None,
        expose_codes: true,
    }
}
