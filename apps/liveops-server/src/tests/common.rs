//! Common test helpers and utilities for server tests.
//!
//! This module provides shared test infrastructure including:
//! - A recording call observer
//! - A request core backed by in-memory SQLite
//! - Principal and credential creation helpers
//! - Authenticated gRPC request construction

use chrono::{DateTime, Duration, Utc};
use liveops_storage::*;
use liveops_store_sqlite::SqliteStore;
use std::sync::{Arc, Mutex};
use tonic::metadata::MetadataValue;
use tonic::Request;

use crate::auth::generate_token;
use crate::observability::{CallObserver, CallRecord};
use crate::service::LiveOpsService;
use crate::validation::EventDraft;

/// Keeps every call record it is handed.
#[derive(Default)]
pub struct RecordingObserver {
    calls: Mutex<Vec<CallRecord>>,
}

impl RecordingObserver {
    pub fn calls(&self) -> Vec<CallRecord> {
        self.calls.lock().unwrap().clone()
    }
}

impl CallObserver for RecordingObserver {
    fn record(&self, call: &CallRecord) {
        self.calls.lock().unwrap().push(call.clone());
    }
}

pub struct TestEnv {
    pub store: Arc<SqliteStore>,
    pub service: LiveOpsService,
    pub observer: Arc<RecordingObserver>,
}

/// Test helper: request core over a fresh in-memory database
pub async fn test_env() -> TestEnv {
    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let observer = Arc::new(RecordingObserver::default());
    let service = LiveOpsService::new(store.clone(), store.clone(), observer.clone());
    TestEnv {
        store,
        service,
        observer,
    }
}

/// Test helper: principal with one credential valid for a day. Returns the token.
pub async fn create_principal_with_token(
    store: &SqliteStore,
    name: &str,
    role: Role,
) -> (Principal, String) {
    let principal = store
        .create_principal(&CreatePrincipalParams {
            name: name.to_string(),
            role,
        })
        .await
        .unwrap();
    let token = create_token(store, principal.id, Utc::now() + Duration::days(1)).await;
    (principal, token)
}

/// Test helper: credential for `principal_id` expiring at `expires_at`
pub async fn create_token(
    store: &SqliteStore,
    principal_id: PrincipalId,
    expires_at: DateTime<Utc>,
) -> String {
    let token = generate_token();
    store
        .create_credential(&CreateCredentialParams {
            principal_id,
            token: token.clone(),
            created_at: expires_at - Duration::days(2),
            expires_at,
        })
        .await
        .unwrap();
    token
}

/// Fixed instant with whole-microsecond precision.
pub fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-07-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Test helper: a valid one-hour event starting at `start`
pub fn event_draft(title: &str, start: DateTime<Utc>) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        description: Some(format!("{title} description")),
        start_time: Some(start),
        end_time: Some(start + Duration::hours(1)),
        rewards: Some(r#"{"coins":100}"#.to_string()),
    }
}

/// Test helper: wrap a message with the `x-api-key` metadata entry
pub fn with_token<T>(message: T, token: &str) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert("x-api-key", MetadataValue::try_from(token).unwrap());
    request
}
