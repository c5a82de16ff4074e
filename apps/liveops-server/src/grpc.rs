//! gRPC adapter: `events.EventService` on top of [`LiveOpsService`].

use chrono::{DateTime, Utc};
use liveops_proto::event_service_server::EventService;
use liveops_proto::{
    CreateEventRequest, DeleteEventRequest, Event, GetEventRequest, ListEventsRequest,
    ListEventsResponse, UpdateEventRequest,
};
use liveops_storage::LiveEvent;
use prost_types::Timestamp;
use tonic::metadata::MetadataMap;
use tonic::{Request, Response, Status};

use crate::auth::bearer_token;
use crate::service::LiveOpsService;
use crate::validation::{EventDraft, ValidationError};

pub struct GrpcEvents {
    service: LiveOpsService,
}

impl GrpcEvents {
    pub fn new(service: LiveOpsService) -> Self {
        Self { service }
    }
}

/// Bearer token from request metadata, copied out before the message is consumed.
fn metadata_token(metadata: &MetadataMap) -> Option<String> {
    bearer_token(|key| metadata.get(key).and_then(|v| v.to_str().ok())).map(str::to_owned)
}

fn to_timestamp(t: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: t.timestamp(),
        nanos: t.timestamp_subsec_nanos() as i32,
    }
}

fn from_timestamp(
    field: &'static str,
    t: Option<Timestamp>,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let Some(t) = t else {
        return Ok(None);
    };
    let nanos = u32::try_from(t.nanos)
        .map_err(|_| ValidationError::InvalidTimestamp(format!("{field}: negative nanos")))?;
    if nanos > 999_999_999 {
        return Err(ValidationError::InvalidTimestamp(format!("{field}: nanos out of range")));
    }
    DateTime::from_timestamp(t.seconds, nanos)
        .map(Some)
        .ok_or_else(|| ValidationError::InvalidTimestamp(format!("{field}: out of range")))
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

fn draft(
    title: String,
    description: String,
    start_time: Option<Timestamp>,
    end_time: Option<Timestamp>,
    rewards: String,
) -> Result<EventDraft, ValidationError> {
    Ok(EventDraft {
        title,
        description: non_empty(description),
        start_time: from_timestamp("start_time", start_time)?,
        end_time: from_timestamp("end_time", end_time)?,
        rewards: non_empty(rewards),
    })
}

pub fn event_to_proto(event: LiveEvent) -> Event {
    Event {
        id: event.id.0.to_string(),
        title: event.title,
        description: event.description.unwrap_or_default(),
        start_time: Some(to_timestamp(event.start_time)),
        end_time: Some(to_timestamp(event.end_time)),
        rewards: event.rewards.unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl EventService for GrpcEvents {
    async fn list_events(
        &self,
        request: Request<ListEventsRequest>,
    ) -> Result<Response<ListEventsResponse>, Status> {
        let token = metadata_token(request.metadata());
        let req = request.into_inner();

        let events = self.service.list_events(token.as_deref(), req.active_only).await?;

        Ok(Response::new(ListEventsResponse {
            events: events.into_iter().map(event_to_proto).collect(),
        }))
    }

    async fn get_event(&self, request: Request<GetEventRequest>) -> Result<Response<Event>, Status> {
        let token = metadata_token(request.metadata());
        let req = request.into_inner();

        let event = self.service.get_event(token.as_deref(), &req.id).await?;

        Ok(Response::new(event_to_proto(event)))
    }

    async fn create_event(
        &self,
        request: Request<CreateEventRequest>,
    ) -> Result<Response<Event>, Status> {
        let token = metadata_token(request.metadata());
        let req = request.into_inner();
        let draft = draft(
            req.title,
            req.description,
            req.start_time,
            req.end_time,
            req.rewards,
        );

        let event = self.service.create_event(token.as_deref(), draft).await?;

        Ok(Response::new(event_to_proto(event)))
    }

    async fn update_event(
        &self,
        request: Request<UpdateEventRequest>,
    ) -> Result<Response<Event>, Status> {
        let token = metadata_token(request.metadata());
        let req = request.into_inner();
        let draft = draft(
            req.title,
            req.description,
            req.start_time,
            req.end_time,
            req.rewards,
        );

        let event = self.service.update_event(token.as_deref(), &req.id, draft).await?;

        Ok(Response::new(event_to_proto(event)))
    }

    async fn delete_event(
        &self,
        request: Request<DeleteEventRequest>,
    ) -> Result<Response<()>, Status> {
        let token = metadata_token(request.metadata());
        let req = request.into_inner();

        self.service.delete_event(token.as_deref(), &req.id).await?;

        Ok(Response::new(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_convert_both_ways() {
        let t = DateTime::from_timestamp(1_700_000_000, 250_000_000).unwrap();
        let ts = to_timestamp(t);
        assert_eq!(ts.seconds, 1_700_000_000);
        assert_eq!(ts.nanos, 250_000_000);
        assert_eq!(from_timestamp("start_time", Some(ts)).unwrap(), Some(t));
        assert_eq!(from_timestamp("start_time", None).unwrap(), None);
    }

    #[test]
    fn negative_nanos_are_invalid() {
        let ts = Timestamp {
            seconds: 0,
            nanos: -1,
        };
        assert!(matches!(
            from_timestamp("end_time", Some(ts)),
            Err(ValidationError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn leap_second_nanos_are_invalid() {
        // chrono accepts this as a leap second.
        let ts = Timestamp {
            seconds: 1_751_371_199,
            nanos: 1_500_000_000,
        };
        assert_eq!(
            from_timestamp("start_time", Some(ts)),
            Err(ValidationError::InvalidTimestamp(
                "start_time: nanos out of range".into()
            ))
        );
    }

    #[test]
    fn empty_strings_become_absent() {
        let d = draft("t".into(), String::new(), None, None, String::new()).unwrap();
        assert_eq!(d.description, None);
        assert_eq!(d.rewards, None);
    }
}
