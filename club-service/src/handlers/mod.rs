//! HTTP handlers for the club service.

pub mod auth;
pub mod events;
pub mod files;
pub mod health;
pub mod users;
