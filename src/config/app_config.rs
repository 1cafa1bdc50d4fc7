use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, Context, Result};
use tracing::warn;

const DEV_JWT_SECRET: &str = "development-only-jwt-secret-change-me";

/// Credentials and endpoints for the Pinata IPFS pinning API.
#[derive(Debug, Clone)]
pub struct PinataConfig {
    pub jwt: String,
    pub api_url: String,
    pub gateway_url: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub public_base_url: String,
    pub upload_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub outbound_timeout: Duration,
    pub max_upload_bytes: usize,
    pub pinata: Option<PinataConfig>,
    /// Echo verification and recovery codes in API responses.
    pub expose_codes: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let environment = current_environment();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/delivery_notes.db".into());
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set, using development secret (INSECURE!)");
                DEV_JWT_SECRET.to_string()
            }
        };

        let token_ttl_hours = parse_env_or("TOKEN_TTL_HOURS", 24 * 7)?;
        let outbound_timeout_secs = parse_env_or("OUTBOUND_TIMEOUT_SECS", 30)?;
        let max_upload_bytes = parse_env_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)? as usize;

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/uploads"));
        let temp_dir = env::var("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir().join("delivery-notes"));

        let pinata = match env::var("PINATA_JWT") {
            Ok(jwt) if !jwt.is_empty() => Some(PinataConfig {
                jwt,
                api_url: env::var("PINATA_API_URL")
                    .unwrap_or_else(|_| "https://api.pinata.cloud".to_string()),
                gateway_url: env::var("PINATA_GATEWAY_URL")
                    .unwrap_or_else(|_| "https://gateway.pinata.cloud/ipfs/".to_string()),
            }),
            _ => None,
        };

        let expose_codes = env::var("EXPOSE_CODES")
            .map(|value| flag_value(&value))
            .unwrap_or(environment == "test");

        Ok(Self {
            database_url,
            host,
            port,
            environment,
            jwt_secret,
            token_ttl: Duration::from_secs(token_ttl_hours * 3600),
            public_base_url,
            upload_dir,
            temp_dir,
            outbound_timeout: Duration::from_secs(outbound_timeout_secs),
            max_upload_bytes,
            pinata,
            expose_codes,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Refuses to start a production server with a missing or placeholder signing secret.
pub fn validate_production_config() {
    if current_environment() != "production" {
        return;
    }

    let secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set in production");

    if secret.len() < 32 {
        panic!("FATAL: JWT_SECRET must be at least 32 bytes in production");
    }

    let lowered = secret.to_ascii_lowercase();
    if lowered.contains("example") || lowered.contains("changeme") || lowered.contains("default")
    {
        panic!("FATAL: JWT_SECRET appears to be a default value. Generate a secure secret!");
    }
}

fn current_environment() -> String {
    env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string())
}

fn flag_value(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "True")
}

fn parse_env_or(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map_err(|_| anyhow!("{} must be a positive integer, got '{}'", key, value)),
        Err(_) => Ok(default),
    }
}
