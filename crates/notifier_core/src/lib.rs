//! Notification core for the project and task management shells.
//! This crate is the single source of truth for notification invariants.
//!
//! Wiring is explicit: open a connection, build a store over it, hand the
//! store to a service.
//!
//! ```no_run
//! use notifier_core::db::open_db_in_memory;
//! use notifier_core::{NotificationService, SqliteNotificationStore};
//!
//! let conn = open_db_in_memory()?;
//! let service = NotificationService::new(SqliteNotificationStore::try_new(&conn)?);
//! let unread = service.unread_count(1)?;
//! # let _ = unread;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::NotifierConfig;
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::notification::{
    EntityKind, EntityRef, NewNotification, Notification, NotificationId, NotificationType,
    NotificationValidationError, Priority, ReadState, UserId,
};
pub use repo::notification_store::{
    normalize_page_limit, NotificationStore, PageRequest, SqliteNotificationStore, StoreError,
    StoreResult, PAGE_DEFAULT_LIMIT, PAGE_LIMIT_MAX,
};
pub use service::notification_service::{
    DeadlineApproaching, Delivery, EmitError, EmitRequest, FailedDelivery, MemberAdded,
    NotificationPage, NotificationService, PartialFailure, StatusChanged, TaskAssigned,
};
pub use service::templates::render_template;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
