//! Transport-agnostic request core.
//!
//! Both protocol adapters decode their wire messages, call one method here and
//! encode the result. Authentication, authorization, validation and the store
//! call happen in that order, in one place, for both transports.

use chrono::{Duration, SubsecRound, Utc};
use liveops_storage::{
    Action, CreateCredentialParams, CreatePrincipalParams, Credential, CredentialStore, EventStore,
    LiveEvent, Principal, PrincipalId, Role, StoreError,
};
use std::sync::Arc;

use crate::auth::{generate_token, AuthError, Authorizer};
use crate::error::ApiError;
use crate::observability::CallObserver;
use crate::validation::{
    parse_credential_id, parse_event_id, parse_principal_id, validate_principal_name,
    validate_valid_days, EventDraft, PrincipalDraft, ValidationError,
};

#[derive(Clone)]
pub struct LiveOpsService {
    events: Arc<dyn EventStore>,
    credentials: Arc<dyn CredentialStore>,
    authorizer: Authorizer,
    observer: Arc<dyn CallObserver>,
}

/// Map a store miss onto a not-found naming the entity.
fn missing(what: &'static str) -> impl Fn(StoreError) -> ApiError {
    move |e| match e {
        StoreError::NotFound => ApiError::not_found(what),
        other => other.into(),
    }
}

impl LiveOpsService {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        events: Arc<dyn EventStore>,
        observer: Arc<dyn CallObserver>,
    ) -> Self {
        Self {
            events,
            authorizer: Authorizer::new(credentials.clone()),
            credentials,
            observer,
        }
    }

    /// Where the protocol loops send their per-call records.
    pub fn observer(&self) -> &Arc<dyn CallObserver> {
        &self.observer
    }

    async fn authorized(
        &self,
        token: Option<&str>,
        action: Action,
    ) -> Result<Principal, ApiError> {
        let token = token.ok_or(AuthError::MissingToken)?;
        let principal = self.authorizer.authenticate(token).await?;
        Authorizer::authorize(Some(&principal), action)?;
        Ok(principal)
    }

    // ───────────────────────────────────── Events ─────────────────────────────────────

    pub async fn list_events(
        &self,
        token: Option<&str>,
        active_only: bool,
    ) -> Result<Vec<LiveEvent>, ApiError> {
        self.authorized(token, Action::Read).await?;
        let active_at = active_only.then(Utc::now);
        Ok(self.events.list_events(active_at).await?)
    }

    pub async fn get_event(&self, token: Option<&str>, id: &str) -> Result<LiveEvent, ApiError> {
        self.authorized(token, Action::Read).await?;
        let id = parse_event_id(id).ok_or_else(|| ApiError::not_found("event"))?;
        self.events.get_event(&id).await.map_err(missing("event"))
    }

    /// `draft` carries any decode failure so it is reported after the auth checks.
    pub async fn create_event(
        &self,
        token: Option<&str>,
        draft: Result<EventDraft, ValidationError>,
    ) -> Result<LiveEvent, ApiError> {
        let principal = self.authorized(token, Action::Create).await?;
        let params = draft?.validate()?;
        let event = self.events.create_event(&params).await?;
        tracing::info!(event_id = %event.id.0, principal = %principal.name, "event created");
        Ok(event)
    }

    pub async fn update_event(
        &self,
        token: Option<&str>,
        id: &str,
        draft: Result<EventDraft, ValidationError>,
    ) -> Result<LiveEvent, ApiError> {
        let principal = self.authorized(token, Action::Update).await?;
        let id = parse_event_id(id).ok_or_else(|| ApiError::not_found("event"))?;
        let params = draft?.validate()?;
        let event = self
            .events
            .update_event(&id, &params)
            .await
            .map_err(missing("event"))?;
        tracing::info!(event_id = %event.id.0, principal = %principal.name, "event updated");
        Ok(event)
    }

    pub async fn delete_event(&self, token: Option<&str>, id: &str) -> Result<(), ApiError> {
        let principal = self.authorized(token, Action::Delete).await?;
        let id = parse_event_id(id).ok_or_else(|| ApiError::not_found("event"))?;
        self.events
            .delete_event(&id)
            .await
            .map_err(missing("event"))?;
        tracing::info!(event_id = %id.0, principal = %principal.name, "event deleted");
        Ok(())
    }

    // ───────────────────────────────────── Admin ──────────────────────────────────────

    pub async fn list_principals(&self, token: Option<&str>) -> Result<Vec<Principal>, ApiError> {
        self.authorized(token, Action::Admin).await?;
        Ok(self.credentials.list_principals().await?)
    }

    pub async fn create_principal(
        &self,
        token: Option<&str>,
        draft: Result<PrincipalDraft, ValidationError>,
    ) -> Result<Principal, ApiError> {
        self.authorized(token, Action::Admin).await?;
        let params = draft?.validate()?;
        match self.credentials.create_principal(&params).await {
            Ok(principal) => Ok(principal),
            Err(StoreError::AlreadyExists) => Err(ApiError::InvalidArgument(format!(
                "principal {} already exists",
                params.name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_principal(
        &self,
        token: Option<&str>,
        id: &str,
    ) -> Result<Principal, ApiError> {
        self.authorized(token, Action::Admin).await?;
        let id = parse_principal_id(id)?;
        self.credentials
            .get_principal(&id)
            .await
            .map_err(missing("principal"))
    }

    /// Deleting a principal also deletes its credentials.
    pub async fn delete_principal(&self, token: Option<&str>, id: &str) -> Result<(), ApiError> {
        let admin = self.authorized(token, Action::Admin).await?;
        let id = parse_principal_id(id)?;
        self.credentials
            .delete_principal(&id)
            .await
            .map_err(missing("principal"))?;
        tracing::info!(principal_id = %id.0, by = %admin.name, "principal deleted");
        Ok(())
    }

    pub async fn list_credentials(
        &self,
        token: Option<&str>,
        principal_id: &str,
    ) -> Result<Vec<Credential>, ApiError> {
        self.authorized(token, Action::Admin).await?;
        let id = parse_principal_id(principal_id)?;
        self.credentials
            .get_principal(&id)
            .await
            .map_err(missing("principal"))?;
        Ok(self.credentials.list_credentials(&id).await?)
    }

    pub async fn issue_credential(
        &self,
        token: Option<&str>,
        principal_id: &str,
        valid_days: Result<i64, ValidationError>,
    ) -> Result<Credential, ApiError> {
        let admin = self.authorized(token, Action::Admin).await?;
        let id = parse_principal_id(principal_id)?;
        let days = validate_valid_days(valid_days?)?;
        self.credentials
            .get_principal(&id)
            .await
            .map_err(missing("principal"))?;
        let credential = issue(self.credentials.as_ref(), id, days).await?;
        tracing::info!(
            credential_id = %credential.id.0,
            principal_id = %id.0,
            by = %admin.name,
            "credential issued"
        );
        Ok(credential)
    }

    pub async fn revoke_credential(&self, token: Option<&str>, id: &str) -> Result<(), ApiError> {
        let admin = self.authorized(token, Action::Admin).await?;
        let id = parse_credential_id(id)?;
        self.credentials
            .delete_credential(&id)
            .await
            .map_err(missing("credential"))?;
        tracing::info!(credential_id = %id.0, by = %admin.name, "credential revoked");
        Ok(())
    }
}

async fn issue(
    store: &dyn CredentialStore,
    principal_id: PrincipalId,
    valid_days: i64,
) -> Result<Credential, ApiError> {
    let created_at = Utc::now().trunc_subsecs(6);
    let params = CreateCredentialParams {
        principal_id,
        token: generate_token(),
        created_at,
        expires_at: created_at + Duration::days(valid_days),
    };
    store.create_credential(&params).await.map_err(ApiError::from)
}

/// Ensure an administrator called `name` exists and issue it a fresh credential.
///
/// Used by the `bootstrap` CLI command, outside any request.
pub async fn bootstrap_admin(
    store: &dyn CredentialStore,
    name: &str,
    valid_days: i64,
) -> Result<(Principal, Credential), ApiError> {
    let name = validate_principal_name(name)?;
    let days = validate_valid_days(valid_days)?;

    let principal = match store.get_principal_by_name(&name).await {
        Ok(existing) if existing.role == Role::Admin => existing,
        Ok(existing) => {
            return Err(ApiError::InvalidArgument(format!(
                "principal {} exists with role {}",
                existing.name, existing.role
            )))
        }
        Err(StoreError::NotFound) => {
            store
                .create_principal(&CreatePrincipalParams {
                    name,
                    role: Role::Admin,
                })
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    let credential = issue(store, principal.id, days).await?;
    Ok((principal, credential))
}
