use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::Utc;
use serde_json::json;

use super::extract::{read_file_field, JsonBody};
use crate::auth::CallerContext;
use crate::error::Result;
use crate::models::CreateDeliveryNoteRequest;
use crate::services::NotePdf;
use crate::AppState;

pub async fn create_note(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    JsonBody(request): JsonBody<CreateDeliveryNoteRequest>,
) -> Result<impl IntoResponse> {
    let note = state.delivery_note_service.create(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.delivery_note_service.list(&caller).await?))
}

pub async fn get_note(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.delivery_note_service.get(&caller, id).await?))
}

/// Redirects to the stored PDF of a signed note, or streams a freshly rendered one.
pub async fn note_pdf(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<Response> {
    let response = match state.delivery_note_service.pdf(&caller, id).await? {
        NotePdf::Stored { url } => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        NotePdf::Rendered { file_name, bytes } => (
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", file_name),
                ),
            ],
            bytes,
        )
            .into_response(),
    };

    Ok(response)
}

/// Signs a note with the image sent in the `signature` multipart field.
///
/// A request that is not multipart at all counts as a missing signature.
pub async fn sign_note(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse> {
    let signature = match multipart {
        Ok(mut multipart) => read_file_field(&mut multipart, "signature")
            .await?
            .map(|part| part.bytes),
        Err(rejection) => {
            tracing::debug!(note_id = id, "Sign request without multipart body: {}", rejection);
            None
        }
    };

    let note = state
        .delivery_note_service
        .sign(&caller, id, signature, Utc::now())
        .await?;

    Ok(Json(json!({
        "message": "Delivery note signed successfully",
        "note": note,
    })))
}

pub async fn delete_note(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.delivery_note_service.delete(&caller, id).await?;
    Ok(Json(json!({ "message": "Delivery note deleted successfully" })))
}
