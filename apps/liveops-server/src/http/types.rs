//! JSON bodies of the HTTP surface.

use chrono::{DateTime, Utc};
use liveops_storage::{Credential, LiveEvent, Principal};
use serde::{Deserialize, Serialize};

use crate::validation::{parse_timestamp, EventDraft, PrincipalDraft, ValidationError};

/// Body of `POST /api/events` and `PUT /api/events/{id}`.
///
/// Times travel as RFC 3339 strings and are parsed here so that a bad value
/// is a validation error rather than a body rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventBody {
    pub title: String,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub rewards: Option<String>,
}

impl TryFrom<EventBody> for EventDraft {
    type Error = ValidationError;

    fn try_from(body: EventBody) -> Result<Self, Self::Error> {
        Ok(EventDraft {
            title: body.title,
            description: body.description,
            start_time: body.start_time.as_deref().map(parse_timestamp).transpose()?,
            end_time: body.end_time.as_deref().map(parse_timestamp).transpose()?,
            rewards: body.rewards,
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub rewards: String,
}

impl From<LiveEvent> for EventView {
    fn from(event: LiveEvent) -> Self {
        Self {
            id: event.id.0.to_string(),
            title: event.title,
            description: event.description.unwrap_or_default(),
            start_time: event.start_time,
            end_time: event.end_time,
            rewards: event.rewards.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PrincipalBody {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: String,
}

impl From<PrincipalBody> for PrincipalDraft {
    fn from(body: PrincipalBody) -> Self {
        PrincipalDraft {
            name: body.username,
            role: body.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrincipalView {
    pub id: String,
    pub username: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<Principal> for PrincipalView {
    fn from(p: Principal) -> Self {
        Self {
            id: p.id.0.to_string(),
            username: p.name,
            role: p.role.as_str().to_string(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CredentialBody {
    pub valid_days: i64,
}

/// A credential as shown to an administrator. `key` is present only in the
/// response that issued it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CredentialView {
    pub id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl CredentialView {
    pub fn issued(c: Credential) -> Self {
        let key = Some(c.token.clone());
        Self {
            key,
            ..Self::redacted(c)
        }
    }

    pub fn redacted(c: Credential) -> Self {
        Self {
            id: c.id.0.to_string(),
            user_id: c.principal_id.0.to_string(),
            key: None,
            created_at: c.created_at,
            expires_at: c.expires_at,
            last_used: c.last_used_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthView {
    pub status: String,
    pub time: DateTime<Utc>,
}
