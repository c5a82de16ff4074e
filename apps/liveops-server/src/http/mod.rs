//! HTTP/JSON adapter on top of [`LiveOpsService`].

mod admin;
mod events;
pub mod types;

use axum::extract::rejection::JsonRejection;
use axum::extract::{MatchedPath, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::observability::{http_status_label, RequestTimer, Transport, UNMATCHED};
use crate::service::LiveOpsService;
use crate::validation::ValidationError;
use types::HealthView;

#[derive(Clone)]
pub struct HttpState {
    pub service: LiveOpsService,
    /// Set when a Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

pub fn router(state: HttpState) -> Router {
    let admin = Router::new()
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route("/users/{id}", get(admin::get_user).delete(admin::delete_user))
        .route("/users/{id}/keys", get(admin::list_keys).post(admin::create_key))
        .route("/keys/{id}", delete(admin::delete_key));

    let api = Router::new()
        .route("/events", get(events::list).post(events::create))
        .route("/events/active", get(events::list_active))
        .route(
            "/events/{id}",
            get(events::get).put(events::update).delete(events::delete),
        )
        .nest("/admin", admin);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .nest("/api", api)
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), record_call))
        .with_state(state)
}

/// One record per request, labelled by route template so ids stay out of the
/// metric labels. Requests that hit the fallback share [`UNMATCHED`].
async fn record_call(State(state): State<HttpState>, request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or(UNMATCHED, MatchedPath::as_str);
    let timer = RequestTimer::new(Transport::Http, format!("{} {route}", request.method()));

    let response = next.run(request).await;
    state
        .service
        .observer()
        .record(&timer.finish(http_status_label(response.status())));
    response
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(|key| headers.get(key).and_then(|v| v.to_str().ok()))
}

/// Unwrap a JSON body, keeping a rejection as a validation error for the core to report.
fn decode<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ValidationError> {
    body.map(|Json(inner)| inner)
        .map_err(|e| ValidationError::MalformedBody(e.body_text()))
}

async fn health() -> Json<HealthView> {
    Json(HealthView {
        status: "ok".to_string(),
        time: Utc::now(),
    })
}

async fn metrics(State(state): State<HttpState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => ApiError::not_found("metrics").into_response(),
    }
}

async fn fallback() -> ApiError {
    ApiError::not_found("route")
}
