//! `/api/admin`: principal and credential management. Every route needs the
//! `admin` action.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::types::{CredentialBody, CredentialView, PrincipalBody, PrincipalView};
use super::{decode, header_token, HttpState};
use crate::error::ApiError;
use crate::validation::PrincipalDraft;

pub async fn list_users(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Result<Json<Vec<PrincipalView>>, ApiError> {
    let principals = state.service.list_principals(header_token(&headers)).await?;
    Ok(Json(principals.into_iter().map(PrincipalView::from).collect()))
}

pub async fn create_user(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Result<Json<PrincipalBody>, JsonRejection>,
) -> Result<(StatusCode, Json<PrincipalView>), ApiError> {
    let draft = decode(body).map(PrincipalDraft::from);
    let principal = state.service.create_principal(header_token(&headers), draft).await?;
    Ok((StatusCode::CREATED, Json(principal.into())))
}

pub async fn get_user(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PrincipalView>, ApiError> {
    let principal = state.service.get_principal(header_token(&headers), &id).await?;
    Ok(Json(principal.into()))
}

pub async fn delete_user(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.service.delete_principal(header_token(&headers), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_keys(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<CredentialView>>, ApiError> {
    let credentials = state.service.list_credentials(header_token(&headers), &id).await?;
    Ok(Json(
        credentials
            .into_iter()
            .map(CredentialView::redacted)
            .collect(),
    ))
}

pub async fn create_key(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CredentialBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CredentialView>), ApiError> {
    let valid_days = decode(body).map(|b| b.valid_days);
    let credential = state.service.issue_credential(header_token(&headers), &id, valid_days).await?;
    Ok((StatusCode::CREATED, Json(CredentialView::issued(credential))))
}

pub async fn delete_key(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.service.revoke_credential(header_token(&headers), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
