//! Bearer credential types.

use chrono::{DateTime, Utc};

use super::{CredentialId, PrincipalId};

/// Opaque bearer token bound to a principal for a validity window.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
    pub id: CredentialId,
    pub principal_id: PrincipalId,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Credential {
    /// A credential is expired from its `expires_at` instant onwards.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Parameters for persisting a newly issued credential.
///
/// The token is generated by the caller; backends only enforce its uniqueness
/// and that `expires_at` is strictly after `created_at`.
#[derive(Clone, Debug)]
pub struct CreateCredentialParams {
    pub principal_id: PrincipalId,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
