use axum::extract::{FromRequest, Multipart};

use crate::error::{AppError, Result};

/// JSON body whose rejections render as `{"message": ...}` with status 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// A file read from a multipart form.
#[derive(Debug)]
pub struct UploadedPart {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Reads the first non-empty file sent under `field_name`; other fields are skipped.
pub async fn read_file_field(
    multipart: &mut Multipart,
    field_name: &str,
) -> Result<Option<UploadedPart>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.body_text()))?
    {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.bin", field_name));
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        if !bytes.is_empty() {
            return Ok(Some(UploadedPart {
                file_name,
                bytes: bytes.to_vec(),
            }));
        }
    }

    Ok(None)
}
