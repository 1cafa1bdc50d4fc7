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
use crate::models::ProjectPayload;
use crate::AppState;

pub async fn create_project(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    JsonBody(payload): JsonBody<ProjectPayload>,
) -> Result<impl IntoResponse> {
    let project = state.project_service.create(&caller, payload).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
    JsonBody(payload): JsonBody<ProjectPayload>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.project_service.update(&caller, id, payload).await?))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.project_service.list(&caller).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.project_service.get(&caller, id).await?))
}

pub async fn archive_project(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let project = state.project_service.archive(&caller, id).await?;
    Ok(Json(json!({ "message": "Project archived", "project": project })))
}

pub async fn restore_project(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let project = state.project_service.restore(&caller, id).await?;
    Ok(Json(json!({ "message": "Project restored", "project": project })))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.project_service.delete(&caller, id).await?;
    Ok(Json(json!({ "message": "Project permanently deleted" })))
}
