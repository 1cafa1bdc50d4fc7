use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde_json::json;

use super::extract::JsonBody;
use crate::auth::CallerContext;
use crate::error::Result;
use crate::models::ClientPayload;
use crate::AppState;

pub async fn create_client(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    JsonBody(payload): JsonBody<ClientPayload>,
) -> Result<impl IntoResponse> {
    let client = state.client_service.create(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn update_client(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<ClientPayload>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.client_service.update(&caller, id, payload).await?))
}

pub async fn list_clients(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.client_service.list(&caller).await?))
}

pub async fn get_client(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.client_service.get(&caller, id).await?))
}

pub async fn archive_client(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let client = state.client_service.archive(&caller, id).await?;
    Ok(Json(json!({
        "message": "Client archived successfully",
        "client": client,
    })))
}

pub async fn restore_client(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let client = state.client_service.restore(&caller, id).await?;
    Ok(Json(json!({ "message": "Client restored", "client": client })))
}

pub async fn delete_client(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.client_service.delete(&caller, id).await?;
    Ok(Json(json!({ "message": "Client permanently deleted" })))
}
