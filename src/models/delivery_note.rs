use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum NoteType {
    Simple,
    Multiple,
}

impl NoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoteType::Simple => "simple",
            NoteType::Multiple => "multiple",
        }
    }
}

impl std::str::FromStr for NoteType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "simple" => Ok(NoteType::Simple),
            "multiple" => Ok(NoteType::Multiple),
            _ => Err(AppError::Validation(
                r#"Invalid type, must be "simple" or "multiple""#.to_string(),
            )),
        }
    }
}

/// One delivered unit of work or material.
///
/// The wire format is the bare object shape; the variant is inferred from
/// which keys are present (`person`/`hours`, `material`/`quantity`, or `name`).
/// Objects mixing keys of different variants are rejected.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LineItem {
    HourBased {
        person: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        hours: Option<f64>,
    },
    MaterialBased {
        material: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        quantity: Option<f64>,
    },
    Simple {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        quantity: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        unit: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        price: Option<f64>,
    },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLineItem {
    person: Option<String>,
    hours: Option<f64>,
    material: Option<String>,
    quantity: Option<f64>,
    name: Option<String>,
    unit: Option<String>,
    price: Option<f64>,
}

impl TryFrom<RawLineItem> for LineItem {
    type Error = String;

    fn try_from(raw: RawLineItem) -> std::result::Result<Self, String> {
        match raw {
            RawLineItem {
                person: Some(person),
                hours,
                material: None,
                quantity: None,
                name: None,
                unit: None,
                price: None,
            } => Ok(LineItem::HourBased { person, hours }),
            RawLineItem {
                person: None,
                hours: None,
                material: Some(material),
                quantity,
                name: None,
                unit: None,
                price: None,
            } => Ok(LineItem::MaterialBased { material, quantity }),
            RawLineItem {
                person: None,
                hours: None,
                material: None,
                quantity,
                name: Some(name),
                unit,
                price,
            } => Ok(LineItem::Simple {
                name,
                quantity,
                unit,
                price,
            }),
            RawLineItem {
                person: None,
                material: None,
                name: None,
                ..
            } => Err("line item needs a person, material or name".to_string()),
            _ => Err("line item mixes person/hours, material/quantity and name fields".to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for LineItem {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawLineItem::deserialize(deserializer)?
            .try_into()
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNote {
    pub id: i64,
    #[serde(rename = "project")]
    pub project_id: i64,
    #[serde(rename = "client")]
    pub client_id: i64,
    pub created_by: i64,
    #[serde(rename = "company")]
    pub company_id: Option<String>,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub data: Vec<LineItem>,
    pub date: DateTime<Utc>,
    pub signed: bool,
    pub signature_url: Option<String>,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A note with its project, client and creator resolved for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryNoteDetail {
    #[serde(flatten)]
    pub note: DeliveryNote,
    pub project_name: Option<String>,
    pub client_name: Option<String>,
    pub created_by_email: Option<String>,
}

/// Body of `POST /deliverynote`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateDeliveryNoteRequest {
    pub project: Option<i64>,
    pub client: Option<i64>,
    #[serde(rename = "type")]
    pub note_type: Option<String>,
    #[serde(default)]
    pub data: Vec<LineItem>,
    pub date: Option<DateTime<Utc>>,
}

/// Validated form of [`CreateDeliveryNoteRequest`].
#[derive(Debug, Clone)]
pub struct NewDeliveryNote {
    pub project_id: i64,
    pub client_id: i64,
    pub note_type: NoteType,
    pub data: Vec<LineItem>,
    pub date: DateTime<Utc>,
}

impl CreateDeliveryNoteRequest {
    pub fn validate(self) -> Result<NewDeliveryNote> {
        let project_id = self
            .project
            .ok_or_else(|| AppError::Validation("Project ID is required".to_string()))?;
        let client_id = self
            .client
            .ok_or_else(|| AppError::Validation("Client ID is required".to_string()))?;
        let note_type = self.note_type.as_deref().unwrap_or_default().parse()?;

        Ok(NewDeliveryNote {
            project_id,
            client_id,
            note_type,
            data: self.data,
            date: self.date.unwrap_or_else(Utc::now),
        })
    }
}

/// Formats quantities the way users typed them: `3` rather than `3.0`.
pub fn format_quantity(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_line_item_shapes_select_variant() {
        let items: Vec<LineItem> = serde_json::from_value(json!([
            {"name": "Service X", "quantity": 3},
            {"person": "Ana", "hours": 7.5},
            {"material": "Cement", "quantity": 12}
        ]))
        .unwrap();

        assert_eq!(
            items[0],
            LineItem::Simple {
                name: "Service X".to_string(),
                quantity: Some(3.0),
                unit: None,
                price: None
            }
        );
        assert!(matches!(items[1], LineItem::HourBased { ref person, hours: Some(hours) } if person == "Ana" && hours == 7.5));
        assert!(matches!(items[2], LineItem::MaterialBased { ref material, .. } if material == "Cement"));

        // Serialization keeps the bare object shape
        let value = serde_json::to_value(&items[0]).unwrap();
        assert_eq!(value, json!({"name": "Service X", "quantity": 3.0}));
    }

    #[test]
    fn test_unrecognised_line_item_is_rejected() {
        let result: std::result::Result<LineItem, _> =
            serde_json::from_value(json!({"colour": "blue"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_mixed_line_item_is_rejected() {
        let result: std::result::Result<LineItem, _> = serde_json::from_value(json!({
            "person": "Ana",
            "hours": 8,
            "material": "Cement",
            "quantity": 3
        }));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("mixes"), "unexpected error: {}", err);

        let request: std::result::Result<CreateDeliveryNoteRequest, _> =
            serde_json::from_value(json!({
                "project": 1,
                "client": 2,
                "type": "multiple",
                "data": [{"name": "Service X", "hours": 2}]
            }));
        assert!(request.is_err());
    }

    #[test]
    fn test_partial_line_items_keep_their_fields() {
        let items: Vec<LineItem> = serde_json::from_value(json!([
            {"material": "Cement"},
            {"person": "Ana"}
        ]))
        .unwrap();

        assert_eq!(
            items,
            vec![
                LineItem::MaterialBased {
                    material: "Cement".to_string(),
                    quantity: None
                },
                LineItem::HourBased {
                    person: "Ana".to_string(),
                    hours: None
                },
            ]
        );
        assert_eq!(
            serde_json::to_value(&items).unwrap(),
            json!([{"material": "Cement"}, {"person": "Ana"}])
        );
    }

    #[test]
    fn test_create_request_validation_order() {
        let missing_project = CreateDeliveryNoteRequest::default().validate();
        assert!(matches!(missing_project, Err(AppError::Validation(msg)) if msg == "Project ID is required"));

        let bad_type = CreateDeliveryNoteRequest {
            project: Some(1),
            client: Some(2),
            note_type: Some("weekly".to_string()),
            ..Default::default()
        }
        .validate();
        assert!(matches!(bad_type, Err(AppError::Validation(msg)) if msg.contains("simple")));

        let ok = CreateDeliveryNoteRequest {
            project: Some(1),
            client: Some(2),
            note_type: Some("multiple".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(ok.note_type, NoteType::Multiple);
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(3.0), "3");
        assert_eq!(format_quantity(7.5), "7.5");
    }
}
