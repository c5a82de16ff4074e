use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::types::{EventBody, EventView};
use super::{decode, header_token, HttpState};
use crate::error::ApiError;
use crate::validation::EventDraft;

pub async fn list(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let events = state.service.list_events(header_token(&headers), false).await?;
    Ok(Json(events.into_iter().map(EventView::from).collect()))
}

pub async fn list_active(
    State(state): State<HttpState>,
    headers: HeaderMap,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let events = state.service.list_events(header_token(&headers), true).await?;
    Ok(Json(events.into_iter().map(EventView::from).collect()))
}

pub async fn get(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<EventView>, ApiError> {
    let event = state.service.get_event(header_token(&headers), &id).await?;
    Ok(Json(event.into()))
}

pub async fn create(
    State(state): State<HttpState>,
    headers: HeaderMap,
    body: Result<Json<EventBody>, JsonRejection>,
) -> Result<(StatusCode, Json<EventView>), ApiError> {
    let draft = decode(body).and_then(EventDraft::try_from);
    let event = state.service.create_event(header_token(&headers), draft).await?;
    Ok((StatusCode::CREATED, Json(event.into())))
}

pub async fn update(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<EventBody>, JsonRejection>,
) -> Result<Json<EventView>, ApiError> {
    let draft = decode(body).and_then(EventDraft::try_from);
    let event = state.service.update_event(header_token(&headers), &id, draft).await?;
    Ok(Json(event.into()))
}

pub async fn delete(
    State(state): State<HttpState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    state.service.delete_event(header_token(&headers), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
