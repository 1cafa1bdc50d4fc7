use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use serde::Deserialize;
use serde_json::json;

use super::extract::{read_file_field, JsonBody};
use crate::auth::CallerContext;
use crate::error::{AppError, Result};
use crate::models::{CompanyUpdateRequest, PersonalData};
use crate::services::LoginRequest;
use crate::AppState;

#[derive(Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl CredentialsBody {
    fn require(&self) -> Result<()> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
pub struct VerificationBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Deserialize)]
pub struct EmailBody {
    #[serde(default)]
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordBody {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize)]
pub struct DeleteQuery {
    pub soft: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CredentialsBody>,
) -> Result<impl IntoResponse> {
    body.require()?;
    let registration = state.user_service.register(&body.email, &body.password).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

pub async fn verify_email(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<VerificationBody>,
) -> Result<impl IntoResponse> {
    if body.code.trim().is_empty() {
        return Err(AppError::Validation(
            "Verification code is required".to_string(),
        ));
    }

    state.user_service.verify(&body.email, body.code.trim()).await?;
    Ok(Json(json!({ "message": "User successfully verified" })))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CredentialsBody>,
) -> Result<impl IntoResponse> {
    body.require()?;
    let response = state
        .auth_service
        .login(LoginRequest {
            email: body.email,
            password: body.password,
        })
        .await?;
    Ok(Json(response))
}

pub async fn onboarding(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    JsonBody(body): JsonBody<PersonalData>,
) -> Result<impl IntoResponse> {
    let user = state
        .user_service
        .update_personal_data(caller.user_id, body)
        .await?;

    Ok(Json(json!({
        "message": "Data successfully updated",
        "firstName": user.first_name,
        "lastName": user.last_name,
        "nif": user.nif,
    })))
}

pub async fn update_company(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    JsonBody(body): JsonBody<CompanyUpdateRequest>,
) -> Result<impl IntoResponse> {
    let update = state
        .user_service
        .update_company(caller.user_id, body.company)
        .await?;

    Ok(Json(json!({
        "message": "Company data successfully updated",
        "company": update.user,
        "token": update.token,
    })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.user_service.me(caller.user_id).await?))
}

pub async fn upload_logo(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let part = read_file_field(&mut multipart, "logo")
        .await?
        .ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;

    let user = state
        .user_service
        .upload_logo(caller.user_id, part.bytes, &part.file_name)
        .await?;

    Ok(Json(json!({
        "message": "Logo uploaded successfully",
        "logo": user.logo,
        "user": user,
    })))
}

pub async fn delete_account(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    Query(query): Query<DeleteQuery>,
) -> Result<impl IntoResponse> {
    let soft = query.soft.as_deref() != Some("false");
    state.user_service.delete_account(caller.user_id, soft).await?;

    let message = if soft {
        "User deactivated"
    } else {
        "User permanently deleted"
    };
    Ok(Json(json!({ "message": message })))
}

pub async fn recover(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<EmailBody>,
) -> Result<impl IntoResponse> {
    let code = state.user_service.start_recovery(&body.email).await?;

    let mut response = json!({ "message": "Recovery code sent" });
    if let Some(code) = code {
        response["code"] = json!(code);
    }
    Ok(Json(response))
}

pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ResetPasswordBody>,
) -> Result<impl IntoResponse> {
    state
        .user_service
        .reset_password(&body.email, body.code.trim(), &body.new_password)
        .await?;
    Ok(Json(json!({ "message": "Password successfully updated" })))
}

pub async fn invite(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerContext>,
    JsonBody(body): JsonBody<EmailBody>,
) -> Result<impl IntoResponse> {
    let guest = state.user_service.invite(caller.user_id, &body.email).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User invited successfully",
            "guest": {
                "email": guest.email,
                "role": guest.role,
                "status": guest.status,
                "invitedBy": guest.invited_by,
                "company": guest.company_id,
            },
        })),
    ))
}
