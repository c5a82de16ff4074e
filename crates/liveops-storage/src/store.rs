//! The collaborator traits that backends implement.

use chrono::{DateTime, Utc};

use crate::types::*;
use crate::StoreError;

/// Principals and their bearer credentials.
///
/// The authorizer only ever reads through this trait; it keeps no state of its own.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    // ───────────────────────────────────── Principals ─────────────────────────────────────

    /// Create a principal. Fails with `AlreadyExists` when the name is taken.
    async fn create_principal(
        &self,
        params: &CreatePrincipalParams,
    ) -> Result<Principal, StoreError>;

    /// Get principal by ID.
    async fn get_principal(&self, principal_id: &PrincipalId) -> Result<Principal, StoreError>;

    /// Get principal by its unique name.
    async fn get_principal_by_name(&self, name: &str) -> Result<Principal, StoreError>;

    /// List all principals ordered by name.
    async fn list_principals(&self) -> Result<Vec<Principal>, StoreError>;

    /// Delete a principal together with all of its credentials.
    async fn delete_principal(&self, principal_id: &PrincipalId) -> Result<(), StoreError>;

    // ───────────────────────────────────── Credentials ────────────────────────────────────

    /// Persist a freshly issued credential.
    async fn create_credential(
        &self,
        params: &CreateCredentialParams,
    ) -> Result<Credential, StoreError>;

    /// Look up a credential by its token value.
    async fn get_credential_by_token(&self, token: &str) -> Result<Credential, StoreError>;

    /// Record a successful authentication.
    async fn touch_credential(
        &self,
        credential_id: &CredentialId,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Delete a credential regardless of its expiry.
    async fn delete_credential(&self, credential_id: &CredentialId) -> Result<(), StoreError>;

    /// List a principal's credentials, newest first.
    async fn list_credentials(
        &self,
        principal_id: &PrincipalId,
    ) -> Result<Vec<Credential>, StoreError>;
}

/// Live events.
#[cfg_attr(feature = "test-support", mockall::automock)]
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new event; the backend assigns its ID.
    async fn create_event(&self, params: &EventParams) -> Result<LiveEvent, StoreError>;

    /// Get event by ID.
    async fn get_event(&self, event_id: &EventId) -> Result<LiveEvent, StoreError>;

    /// Replace every field of an existing event. `NotFound` when no row matched.
    async fn update_event(
        &self,
        event_id: &EventId,
        params: &EventParams,
    ) -> Result<LiveEvent, StoreError>;

    /// Delete an event. `NotFound` when no row matched.
    async fn delete_event(&self, event_id: &EventId) -> Result<(), StoreError>;

    /// List events ordered by start time. With `active_at`, only events whose
    /// `[start_time, end_time)` window contains that instant are returned.
    async fn list_events(
        &self,
        active_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<LiveEvent>, StoreError>;
}
