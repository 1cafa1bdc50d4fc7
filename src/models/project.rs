use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub archived: bool,
    #[serde(rename = "client")]
    pub client_id: i64,
    pub created_by: i64,
    #[serde(rename = "company")]
    pub company_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /project` and `PUT /project/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPayload {
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub client: Option<i64>,
}

impl ProjectPayload {
    /// Validates the body and returns the referenced client id.
    pub fn validate(&self) -> Result<i64> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Project name is required".to_string()));
        }
        if name.chars().count() > 100 {
            return Err(AppError::Validation("Name is too long".to_string()));
        }

        self.client.ok_or_else(|| {
            AppError::Validation("You must provide the associated client ID".to_string())
        })
    }
}
