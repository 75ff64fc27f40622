//! Repository layer contracts and persistence implementations.
//!
//! # Responsibility
//! - Define the notification storage contract used by the service layer.
//! - Isolate SQLite query details from event-to-notification orchestration.
//!
//! # Invariants
//! - Store writes enforce `NewNotification::validate()` before persistence.
//! - Mark-read on unknown ids/users is a no-op, not a `NotFound` error.

pub mod notification_store;
