use axum::{
    Json,
    extract::{Path, Query, State},
};
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RegistryError;
use crate::middleware::auth::AuthenticatedCaller;
use crate::router::RegistryState;
use crate::service::aggregation::SubjectSummary;
use crate::service::reconciliation::{
    PersonalNamesRequest, RegisterRequest, SubjectRecord, UpdateRequest,
};
use crate::service::Operation;

type JsonBody<T> = WithRejection<Json<T>, RegistryError>;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "educationLevel")]
    pub education_level: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPasswordRequest {
    pub admin_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// GET /admin?educationLevel=... -> non-student subjects at that level.
pub async fn list_accounts(
    State(state): State<RegistryState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    WithRejection(Query(query), _): WithRejection<Query<ListQuery>, RegistryError>,
) -> Result<Json<Vec<SubjectSummary>>, RegistryError> {
    state.gate.authorize(caller.role, Operation::ListAccounts)?;
    let level = query
        .education_level
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .ok_or_else(|| RegistryError::validation("educationLevel is required"))?;

    let visibility = state.gate.listing_visibility();
    let rows = state
        .aggregation
        .list_by_education_level(level, &visibility)
        .await?;
    Ok(Json(rows))
}

/// POST /admin/register
pub async fn register_subject(
    State(state): State<RegistryState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    WithRejection(Json(req), _): JsonBody<RegisterRequest>,
) -> Result<Json<MessageResponse>, RegistryError> {
    state.reconciliation.register_subject(&caller, req).await?;
    Ok(Json(MessageResponse {
        message: "Register Successful",
    }))
}

/// PATCH /admin/account/{id}
pub async fn update_account(
    State(state): State<RegistryState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    WithRejection(Json(req), _): JsonBody<UpdateRequest>,
) -> Result<Json<SubjectRecord>, RegistryError> {
    let record = state.reconciliation.update_subject(&caller, &id, req).await?;
    Ok(Json(record))
}

/// GET /admin/account/{id}
///
/// Open to every authenticated role unless `restrict_account_read` is set.
pub async fn read_account(
    State(state): State<RegistryState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
) -> Result<Json<SubjectRecord>, RegistryError> {
    let record = state.reconciliation.read_subject(&caller, &id).await?;
    Ok(Json(record))
}

/// PUT /admin/account/{id}/personal
pub async fn set_personal_names(
    State(state): State<RegistryState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Path(id): Path<String>,
    WithRejection(Json(req), _): JsonBody<PersonalNamesRequest>,
) -> Result<Json<MessageResponse>, RegistryError> {
    state
        .reconciliation
        .set_personal_names(&caller, &id, req)
        .await?;
    Ok(Json(MessageResponse {
        message: "Personal details updated",
    }))
}

/// POST /admin/password -> confirm the caller's own password.
pub async fn confirm_password(
    State(state): State<RegistryState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    WithRejection(Json(req), _): JsonBody<ConfirmPasswordRequest>,
) -> Result<Json<MessageResponse>, RegistryError> {
    if !state
        .reauth
        .confirm_password(caller.id, &req.admin_password)
        .await?
    {
        info!(subject_id = %caller.id, "password confirmation rejected");
        return Err(RegistryError::PasswordMismatch);
    }
    Ok(Json(MessageResponse {
        message: "Authentication Successful",
    }))
}
