//! service-core: configuration, errors, HTTP middleware and telemetry shared
//! by the club binaries.
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
