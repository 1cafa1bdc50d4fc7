use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    Guest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Inactive,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    pub is_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub nif: Option<String>,
    pub is_autonomous: bool,
    pub company_name: Option<String>,
    pub company_cif: Option<String>,
    pub company_address: Option<String>,
    pub company_street: Option<String>,
    pub company_number: Option<i64>,
    pub company_postal: Option<i64>,
    pub company_city: Option<String>,
    pub company_province: Option<String>,
    #[serde(rename = "company")]
    pub company_id: Option<String>,
    pub logo: Option<String>,
    #[serde(skip_serializing)]
    pub recovery_code: Option<String>,
    pub status: UserStatus,
    pub role: Role,
    pub invited_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Company section of a user profile, as written by the company update flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyProfile {
    pub is_autonomous: bool,
    pub name: String,
    pub cif: String,
    pub address: String,
    pub street: Option<String>,
    pub number: Option<i64>,
    pub postal: Option<i64>,
    pub city: Option<String>,
    pub province: Option<String>,
}

/// Personal section of a user profile (onboarding).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalData {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub nif: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyData {
    pub company_name: Option<String>,
    pub company_cif: Option<String>,
    pub company_address: Option<String>,
    pub company_street: Option<String>,
    pub company_number: Option<i64>,
    pub company_postal: Option<i64>,
    pub company_city: Option<String>,
    pub company_province: Option<String>,
    #[serde(default)]
    pub is_autonomous: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyUpdateRequest {
    #[serde(default)]
    pub company: CompanyData,
}
