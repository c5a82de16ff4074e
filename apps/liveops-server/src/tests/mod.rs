//! Server unit and integration tests.
//!
//! Tests are organized into modules by feature area:
//! - `common` - Shared test helpers and utilities
//! - `auth` - Credential authentication and the permission table
//! - `service` - The transport-agnostic request core
//! - `grpc` - gRPC adapter, called through the service trait
//! - `http` - HTTP adapter, driven through the router
//! - `mux` - Connection classification and routing
//! - `e2e` - Both protocols against a live gateway on one port

pub mod common;
