//! Per-call recording and Prometheus metrics.
//!
//! Every inbound call, on either transport, produces exactly one [`CallRecord`].
//! Recording happens at the edge of each protocol loop: a router middleware for
//! HTTP and [`GrpcRecordLayer`] around the tonic routes. Both hand the record to
//! the [`CallObserver`] the request core was built with; production uses
//! [`TelemetryObserver`], tests inject their own.

use axum::http::{HeaderMap, Request, Response, StatusCode};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tonic::Code;
use tower::{Layer, Service};

/// Method label for calls that matched no route.
pub const UNMATCHED: &str = "unmatched";

/// RPC paths served by the gateway; anything else is labelled [`UNMATCHED`].
const GRPC_METHODS: &[&str] = &[
    "/events.EventService/ListEvents",
    "/events.EventService/GetEvent",
    "/events.EventService/CreateEvent",
    "/events.EventService/UpdateEvent",
    "/events.EventService/DeleteEvent",
    "/grpc.health.v1.Health/Check",
    "/grpc.health.v1.Health/Watch",
];

/// Which protocol loop served a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transport {
    Grpc,
    Http,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transport::Grpc => "grpc",
            Transport::Http => "http",
        }
    }
}

/// One finished call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRecord {
    pub transport: Transport,
    /// RPC path, or `"<VERB> <route template>"` for HTTP.
    pub method: String,
    /// `ok` or the error class (`unauthenticated`, `not_found`, ...).
    pub status: &'static str,
    pub latency: Duration,
}

/// Sink for call records.
pub trait CallObserver: Send + Sync {
    fn record(&self, call: &CallRecord);
}

/// Logs each call and feeds the metrics recorder, if one is installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct TelemetryObserver;

impl CallObserver for TelemetryObserver {
    fn record(&self, call: &CallRecord) {
        tracing::info!(
            transport = call.transport.as_str(),
            method = %call.method,
            status = call.status,
            latency_ms = call.latency.as_secs_f64() * 1000.0,
            "call finished"
        );

        counter!(
            "liveops_requests_total",
            "transport" => call.transport.as_str(),
            "method" => call.method.clone(),
            "status" => call.status
        )
        .increment(1);
        histogram!(
            "liveops_request_duration_seconds",
            "transport" => call.transport.as_str(),
            "method" => call.method.clone()
        )
        .record(call.latency.as_secs_f64());
    }
}

/// Install the Prometheus recorder and return a handle for rendering.
///
/// Fails if a global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        "liveops_requests_total",
        "Total number of calls by transport, method and outcome"
    );
    describe_histogram!(
        "liveops_request_duration_seconds",
        "Duration of calls in seconds"
    );

    Ok(handle)
}

/// Times one call from construction to [`RequestTimer::finish`].
pub struct RequestTimer {
    transport: Transport,
    method: String,
    start: Instant,
}

impl RequestTimer {
    pub fn new(transport: Transport, method: impl Into<String>) -> Self {
        Self {
            transport,
            method: method.into(),
            start: Instant::now(),
        }
    }

    /// Consume the timer; a timer can only be finished once.
    pub fn finish(self, status: &'static str) -> CallRecord {
        CallRecord {
            transport: self.transport,
            method: self.method,
            status,
            latency: self.start.elapsed(),
        }
    }
}

// ───────────────────────────────────── Status labels ─────────────────────────────────────

pub fn http_status_label(status: StatusCode) -> &'static str {
    match status {
        s if s.is_success() || s.is_redirection() => "ok",
        StatusCode::BAD_REQUEST => "invalid_argument",
        StatusCode::UNAUTHORIZED => "unauthenticated",
        StatusCode::FORBIDDEN => "permission_denied",
        StatusCode::NOT_FOUND => "not_found",
        StatusCode::METHOD_NOT_ALLOWED => "method_not_allowed",
        StatusCode::UNSUPPORTED_MEDIA_TYPE => "unsupported_media_type",
        s if s.is_server_error() => "internal",
        _ => "client_error",
    }
}

pub fn grpc_status_label(code: Code) -> &'static str {
    match code {
        Code::Ok => "ok",
        Code::Cancelled => "cancelled",
        Code::Unknown => "unknown",
        Code::InvalidArgument => "invalid_argument",
        Code::DeadlineExceeded => "deadline_exceeded",
        Code::NotFound => "not_found",
        Code::AlreadyExists => "already_exists",
        Code::PermissionDenied => "permission_denied",
        Code::ResourceExhausted => "resource_exhausted",
        Code::FailedPrecondition => "failed_precondition",
        Code::Aborted => "aborted",
        Code::OutOfRange => "out_of_range",
        Code::Unimplemented => "unimplemented",
        Code::Internal => "internal",
        Code::Unavailable => "unavailable",
        Code::DataLoss => "data_loss",
        Code::Unauthenticated => "unauthenticated",
    }
}

fn grpc_method_label(path: &str) -> &'static str {
    GRPC_METHODS
        .iter()
        .find(|known| **known == path)
        .copied()
        .unwrap_or(UNMATCHED)
}

/// Unary failures travel trailers-only, so the status is in the headers.
/// No status there means the call succeeded and the code is in the trailers.
fn grpc_response_label(headers: &HeaderMap) -> &'static str {
    match tonic::Status::from_header_map(headers) {
        Some(status) => grpc_status_label(status.code()),
        None => "ok",
    }
}

// ───────────────────────────────────── gRPC layer ─────────────────────────────────────

/// Records every request reaching the tonic server, including health checks
/// and methods no service implements.
#[derive(Clone)]
pub struct GrpcRecordLayer {
    observer: Arc<dyn CallObserver>,
}

impl GrpcRecordLayer {
    pub fn new(observer: Arc<dyn CallObserver>) -> Self {
        Self { observer }
    }
}

impl<S> Layer<S> for GrpcRecordLayer {
    type Service = GrpcRecord<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GrpcRecord {
            inner,
            observer: self.observer.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GrpcRecord<S> {
    inner: S,
    observer: Arc<dyn CallObserver>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for GrpcRecord<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let timer = RequestTimer::new(Transport::Grpc, grpc_method_label(request.uri().path()));
        let observer = self.observer.clone();
        let response = self.inner.call(request);

        Box::pin(async move {
            let result = response.await;
            let status = match &result {
                Ok(response) => grpc_response_label(response.headers()),
                Err(_) => "internal",
            };
            observer.record(&timer.finish(status));
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_timer() {
        let timer = RequestTimer::new(Transport::Grpc, "GetEvent");
        std::thread::sleep(Duration::from_millis(1));
        let record = timer.finish("ok");

        assert_eq!(record.transport, Transport::Grpc);
        assert_eq!(record.method, "GetEvent");
        assert_eq!(record.status, "ok");
        assert!(record.latency >= Duration::from_millis(1));
    }

    #[test]
    fn test_telemetry_observer_without_recorder() {
        // No recorder installed: metrics calls are no-ops.
        TelemetryObserver.record(&CallRecord {
            transport: Transport::Http,
            method: "GET /api/events".to_string(),
            status: "ok",
            latency: Duration::from_millis(3),
        });
    }

    #[test]
    fn http_labels_follow_the_error_classes() {
        assert_eq!(http_status_label(StatusCode::OK), "ok");
        assert_eq!(http_status_label(StatusCode::NO_CONTENT), "ok");
        assert_eq!(http_status_label(StatusCode::UNAUTHORIZED), "unauthenticated");
        assert_eq!(http_status_label(StatusCode::FORBIDDEN), "permission_denied");
        assert_eq!(http_status_label(StatusCode::NOT_FOUND), "not_found");
        assert_eq!(
            http_status_label(StatusCode::METHOD_NOT_ALLOWED),
            "method_not_allowed"
        );
        assert_eq!(http_status_label(StatusCode::BAD_GATEWAY), "internal");
    }

    #[test]
    fn unknown_rpc_paths_share_one_label() {
        assert_eq!(
            grpc_method_label("/events.EventService/CreateEvent"),
            "/events.EventService/CreateEvent"
        );
        assert_eq!(grpc_method_label("/events.EventService/DropAll"), UNMATCHED);
        assert_eq!(grpc_method_label("/"), UNMATCHED);
    }

    #[test]
    fn grpc_status_is_read_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(grpc_response_label(&headers), "ok");

        headers.insert("grpc-status", "16".parse().unwrap());
        assert_eq!(grpc_response_label(&headers), "unauthenticated");

        headers.insert("grpc-status", "12".parse().unwrap());
        assert_eq!(grpc_response_label(&headers), "unimplemented");
    }
}
