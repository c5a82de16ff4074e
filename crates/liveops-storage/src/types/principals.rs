//! Principal types.

use chrono::{DateTime, Utc};

use super::{PrincipalId, Role};

/// An identity with a role. Names are unique across the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating a principal
#[derive(Clone, Debug)]
pub struct CreatePrincipalParams {
    pub name: String,
    pub role: Role,
}
