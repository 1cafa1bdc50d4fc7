use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AppError, Result};
use crate::validation;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub contact_person: Option<String>,
    pub archived: bool,
    pub created_by: i64,
    #[serde(rename = "company")]
    pub company_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /client` and `PUT /client/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPayload {
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub contact_person: Option<String>,
}

impl ClientPayload {
    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation(
                "The clients name is required".to_string(),
            ));
        }
        if name.chars().count() > 100 {
            return Err(AppError::Validation("The name is too long".to_string()));
        }

        if let Some(email) = self.email.as_deref() {
            if !validation::is_valid_email(email) {
                return Err(AppError::Validation("The email is not valid".to_string()));
            }
        }

        if let Some(phone) = self.phone.as_deref() {
            if !validation::is_valid_phone(phone) {
                return Err(AppError::Validation("Invalid phone number".to_string()));
            }
        }

        if let Some(address) = self.address.as_deref() {
            if address.chars().count() > 200 {
                return Err(AppError::Validation("The address is too long".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: &str) -> ClientPayload {
        ClientPayload {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_name_is_required() {
        assert!(matches!(
            payload("  ").validate(),
            Err(AppError::Validation(msg)) if msg == "The clients name is required"
        ));
        assert!(payload("Acme").validate().is_ok());
    }

    #[test]
    fn test_optional_contact_fields_are_checked_when_present() {
        let mut request = payload("Acme");
        request.email = Some("not-an-email".to_string());
        assert!(request.validate().is_err());

        request.email = Some("billing@acme.test".to_string());
        request.phone = Some("call me".to_string());
        assert!(request.validate().is_err());

        request.phone = Some("+34 699 312 233".to_string());
        request.address = Some("x".repeat(201));
        assert!(request.validate().is_err());

        request.address = Some("Test Street 123".to_string());
        assert!(request.validate().is_ok());
    }
}
