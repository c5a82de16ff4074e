//! Bearer credential authentication and role-based authorization.
//!
//! The [`Authorizer`] keeps no state of its own: every call goes back to the
//! credential store, so a revoked or expired credential stops working on the
//! very next request.

use chrono::{DateTime, Utc};
use liveops_storage::{Action, Credential, CredentialStore, Principal, Role, StoreError};
use rand_core::{OsRng, RngCore};
use std::sync::Arc;
use thiserror::Error;

/// Metadata key / header carrying the credential.
pub const API_KEY_HEADER: &str = "x-api-key";
pub const AUTHORIZATION_HEADER: &str = "authorization";

const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingToken,
    #[error("invalid credential")]
    InvalidToken,
    #[error("credential expired")]
    Expired,
    /// The credential is valid but its principal could not be resolved.
    #[error("unauthorized")]
    Unauthorized,
    #[error("credential lookup failed: {0}")]
    Backend(StoreError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("role {role} may not {action}")]
    Forbidden { role: Role, action: Action },
}

/// Pull a bearer token from a transport's header/metadata map.
///
/// `x-api-key` wins; otherwise `authorization: Bearer <token>` is accepted.
pub fn bearer_token<'a, F>(header: F) -> Option<&'a str>
where
    F: Fn(&str) -> Option<&'a str>,
{
    if let Some(token) = header(API_KEY_HEADER) {
        return Some(token);
    }
    let value = header(AUTHORIZATION_HEADER)?;
    let (scheme, token) = value.trim().split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then_some(token)
}

/// Fresh high-entropy credential token (hex of 32 random bytes).
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn CredentialStore>,
}

impl Authorizer {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        self.authenticate_at(token, Utc::now()).await
    }

    /// Resolve `token` to its principal as of `now`.
    pub async fn authenticate_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Principal, AuthError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }

        let credential = match self.store.get_credential_by_token(token).await {
            Ok(credential) => credential,
            Err(StoreError::NotFound) => return Err(AuthError::InvalidToken),
            Err(e) => return Err(AuthError::Backend(e)),
        };

        if credential.is_expired_at(now) {
            return Err(AuthError::Expired);
        }

        // Best effort: the result is deliberately dropped here and nowhere else.
        if let Err(e) = self.record_use(&credential, now).await {
            tracing::warn!(
                credential_id = %credential.id.0,
                error = %e,
                "failed to update credential last-used time"
            );
        }

        self.store
            .get_principal(&credential.principal_id)
            .await
            .map_err(|_| AuthError::Unauthorized)
    }

    async fn record_use(
        &self,
        credential: &Credential,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.store.touch_credential(&credential.id, now).await
    }

    /// Static permission check; an absent principal is always denied.
    pub fn authorize(
        principal: Option<&Principal>,
        action: Action,
    ) -> Result<(), PermissionError> {
        let principal = principal.ok_or(PermissionError::Unauthorized)?;
        if principal.role.permits(action) {
            Ok(())
        } else {
            Err(PermissionError::Forbidden {
                role: principal.role,
                action,
            })
        }
    }
}
