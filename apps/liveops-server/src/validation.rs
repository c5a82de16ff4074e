//! Input validation shared by both transports.
//!
//! Adapters decode their wire format into these drafts; nothing here knows
//! about protobuf or JSON. Everything is checked before a store is touched.

use chrono::{DateTime, SubsecRound, Utc};
use liveops_storage::{
    CreatePrincipalParams, CredentialId, EventId, EventParams, PrincipalId, Role,
};
use serde::de::IgnoredAny;
use thiserror::Error;
use uuid::Uuid;

pub const MIN_VALID_DAYS: i64 = 1;
pub const MAX_VALID_DAYS: i64 = 365;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("title is required")]
    EmptyTitle,
    #[error("start_time is required")]
    MissingStartTime,
    #[error("end_time is required")]
    MissingEndTime,
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("start_time must not be after end_time")]
    InvalidTimeRange,
    #[error("rewards must be valid JSON")]
    InvalidRewards,
    #[error("name is required")]
    EmptyName,
    #[error("invalid role: {0}")]
    InvalidRole(String),
    #[error("valid_days must be between 1 and 365")]
    InvalidValidity,
    #[error("invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

/// An event as received from a client, before any checks.
#[derive(Clone, Debug, Default)]
pub struct EventDraft {
    pub title: String,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub rewards: Option<String>,
}

impl EventDraft {
    pub fn validate(self) -> Result<EventParams, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        // Stored precision is microseconds; normalise up front so responses match reads.
        let start_time = self
            .start_time
            .ok_or(ValidationError::MissingStartTime)?
            .trunc_subsecs(6);
        let end_time = self
            .end_time
            .ok_or(ValidationError::MissingEndTime)?
            .trunc_subsecs(6);
        if start_time > end_time {
            return Err(ValidationError::InvalidTimeRange);
        }

        let rewards = self.rewards.filter(|r| !r.is_empty());
        if let Some(rewards) = &rewards {
            serde_json::from_str::<IgnoredAny>(rewards)
                .map_err(|_| ValidationError::InvalidRewards)?;
        }

        Ok(EventParams {
            title: title.to_string(),
            description: self.description.filter(|d| !d.is_empty()),
            start_time,
            end_time,
            rewards,
        })
    }
}

/// A principal as received on the admin surface.
#[derive(Clone, Debug, Default)]
pub struct PrincipalDraft {
    pub name: String,
    pub role: String,
}

impl PrincipalDraft {
    pub fn validate(self) -> Result<CreatePrincipalParams, ValidationError> {
        Ok(CreatePrincipalParams {
            name: validate_principal_name(&self.name)?,
            role: parse_role(&self.role)?,
        })
    }
}

/// `None` means the id can't name any event; callers report not-found.
pub fn parse_event_id(raw: &str) -> Option<EventId> {
    Uuid::try_parse(raw.trim()).ok().map(EventId)
}

pub fn parse_principal_id(raw: &str) -> Result<PrincipalId, ValidationError> {
    parse_id("principal", raw).map(PrincipalId)
}

pub fn parse_credential_id(raw: &str) -> Result<CredentialId, ValidationError> {
    parse_id("credential", raw).map(CredentialId)
}

fn parse_id(kind: &'static str, raw: &str) -> Result<Uuid, ValidationError> {
    Uuid::try_parse(raw.trim()).map_err(|_| ValidationError::InvalidId {
        kind,
        value: raw.to_string(),
    })
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidTimestamp(raw.to_string()))
}

pub fn validate_principal_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    Ok(name.to_string())
}

pub fn parse_role(raw: &str) -> Result<Role, ValidationError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse::<Role>()
        .map_err(|_| ValidationError::InvalidRole(raw.to_string()))
}

pub fn validate_valid_days(days: i64) -> Result<i64, ValidationError> {
    if (MIN_VALID_DAYS..=MAX_VALID_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(ValidationError::InvalidValidity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn draft() -> EventDraft {
        let start = Utc::now();
        EventDraft {
            title: "Summer Sale".into(),
            description: Some("50% off".into()),
            start_time: Some(start),
            end_time: Some(start + Duration::hours(1)),
            rewards: Some(r#"{"coins": 100}"#.into()),
        }
    }

    #[test]
    fn valid_draft_passes() {
        let params = draft().validate().unwrap();
        assert_eq!(params.title, "Summer Sale");
        assert_eq!(params.rewards.as_deref(), Some(r#"{"coins": 100}"#));
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut d = draft();
        d.title = "   ".into();
        assert_eq!(d.validate().unwrap_err(), ValidationError::EmptyTitle);
    }

    #[test]
    fn missing_times_are_rejected() {
        let mut d = draft();
        d.start_time = None;
        assert_eq!(d.validate().unwrap_err(), ValidationError::MissingStartTime);

        let mut d = draft();
        d.end_time = None;
        assert_eq!(d.validate().unwrap_err(), ValidationError::MissingEndTime);
    }

    #[test]
    fn start_after_end_is_rejected_but_equal_is_fine() {
        let mut d = draft();
        d.end_time = d.start_time.map(|s| s - Duration::seconds(1));
        assert_eq!(d.validate().unwrap_err(), ValidationError::InvalidTimeRange);

        let mut d = draft();
        d.end_time = d.start_time;
        assert!(d.validate().is_ok());
    }

    #[test]
    fn rewards_must_be_json_when_present() {
        let mut d = draft();
        d.rewards = Some("{not json".into());
        assert_eq!(d.validate().unwrap_err(), ValidationError::InvalidRewards);

        let mut d = draft();
        d.rewards = Some(String::new());
        assert_eq!(d.validate().unwrap().rewards, None);

        let mut d = draft();
        d.rewards = Some("[1, 2, 3]".into());
        assert!(d.validate().is_ok());
    }

    #[test]
    fn times_are_truncated_to_micros() {
        let start = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let mut d = draft();
        d.start_time = Some(start);
        d.end_time = Some(start + Duration::hours(1));

        let params = d.validate().unwrap();
        assert_eq!(params.start_time.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn id_parsing() {
        assert!(parse_event_id("not-a-uuid").is_none());
        assert!(parse_event_id(&Uuid::now_v7().to_string()).is_some());
        assert!(matches!(
            parse_principal_id("42"),
            Err(ValidationError::InvalidId { kind: "principal", .. })
        ));
    }

    #[test]
    fn admin_inputs() {
        assert_eq!(parse_role("Editor").unwrap(), Role::Editor);
        assert!(matches!(parse_role("root"), Err(ValidationError::InvalidRole(_))));
        assert_eq!(validate_principal_name("  ops "), Ok("ops".to_string()));
        assert_eq!(validate_principal_name(""), Err(ValidationError::EmptyName));
        assert!(validate_valid_days(0).is_err());
        assert!(validate_valid_days(366).is_err());
        assert_eq!(validate_valid_days(365), Ok(365));
    }

    #[test]
    fn rfc3339_timestamps() {
        let t = parse_timestamp("2025-06-01T12:00:00+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2025-06-01T10:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_err());
    }
}
