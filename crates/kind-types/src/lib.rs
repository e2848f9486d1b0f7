//! Shared types for the KindMatch backend: domain models, REST DTOs and
//! gateway events.

pub mod api;
pub mod events;
pub mod models;
