//! Live event types.

use chrono::{DateTime, Utc};

use super::EventId;

/// A time-bounded live event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveEvent {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Opaque JSON document, never interpreted by the store.
    pub rewards: Option<String>,
}

impl LiveEvent {
    /// Whether `now` falls inside the half-open `[start_time, end_time)` window.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }
}

/// Every mutable field of an event; used for both insert and full replace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventParams {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub rewards: Option<String>,
}
