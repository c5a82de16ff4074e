//! Generated protobuf types and gRPC stubs for `events.EventService`.

tonic::include_proto!("events");
