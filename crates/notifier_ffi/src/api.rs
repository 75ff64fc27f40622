//! FFI polling API for the notification badge and list.
//!
//! # Responsibility
//! - Expose the notification surface contract to Dart via FRB.
//! - Degrade silently on failure: the shell keeps its last state and the
//!   error goes to the log, never to the user's primary workflow.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Every call opens its own connection, so each poll observes every write
//!   committed before it.

use log::warn;
use notifier_core::db::open_db;
use notifier_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, ping as ping_inner,
    Notification, NotificationService, NotifierConfig, SqliteNotificationStore, StoreResult,
};
use std::path::PathBuf;
use std::sync::OnceLock;

static DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Exposes core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Badge value returned to the polling timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadBadge {
    /// Unread count; `0` when `ok == false`.
    pub count: u64,
    /// `false` means the shell should keep its previous badge.
    pub ok: bool,
    /// Diagnostic message, empty on success.
    pub message: String,
}

/// Flat notification shape for Dart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationItem {
    pub id: i64,
    /// Type tag (`member_added`, `custom:<name>`, ...).
    pub kind: String,
    pub title: String,
    pub message: String,
    /// `low|normal|high|urgent`.
    pub priority: String,
    /// `project|task` when a deep link exists.
    pub related_kind: Option<String>,
    pub related_id: Option<String>,
    pub created_at_ms: i64,
    pub is_read: bool,
    pub read_at_ms: Option<i64>,
}

/// List response envelope for the notification panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationListResponse {
    /// Most recent first; empty when `ok == false`.
    pub items: Vec<NotificationItem>,
    pub ok: bool,
    pub message: String,
    /// Effective applied page size.
    pub applied_limit: u32,
}

/// Command response envelope for read-state actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub ok: bool,
    /// Number of notifications that changed state.
    pub changed: u64,
    pub message: String,
}

impl ActionResponse {
    fn success(changed: u64) -> Self {
        Self {
            ok: true,
            changed,
            message: String::new(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            changed: 0,
            message: message.into(),
        }
    }
}

/// Returns the unread badge value for one user.
///
/// # FFI contract
/// - Sync call on the UI refresh tick; backed by an indexed count.
/// - Never panics; failures yield `ok=false` and are logged.
#[flutter_rust_bridge::frb(sync)]
pub fn notifications_unread_count(user_id: i64) -> UnreadBadge {
    match with_service(|service| service.unread_count(user_id)) {
        Ok(count) => UnreadBadge {
            count,
            ok: true,
            message: String::new(),
        },
        Err(message) => {
            warn!(
                "event=ffi_unread_count module=ffi status=error user={} error={}",
                user_id, message
            );
            UnreadBadge {
                count: 0,
                ok: false,
                message,
            }
        }
    }
}

/// Lists one page of a user's notifications, most recent first.
///
/// # FFI contract
/// - `limit=None` or `Some(0)` uses the default page size; large limits are
///   clamped.
/// - Never panics; failures yield an empty, `ok=false` envelope.
#[flutter_rust_bridge::frb(sync)]
pub fn notifications_list(
    user_id: i64,
    offset: u32,
    limit: Option<u32>,
) -> NotificationListResponse {
    let requested = limit.unwrap_or(0);
    match with_service(|service| service.user_notifications(user_id, offset, requested)) {
        Ok(page) => NotificationListResponse {
            items: page.items.into_iter().map(to_item).collect(),
            ok: true,
            message: String::new(),
            applied_limit: page.applied_limit,
        },
        Err(message) => {
            warn!(
                "event=ffi_list module=ffi status=error user={} offset={} error={}",
                user_id, offset, message
            );
            NotificationListResponse {
                items: Vec::new(),
                ok: false,
                message,
                applied_limit: notifier_core::normalize_page_limit(requested),
            }
        }
    }
}

/// Marks one notification read. Unknown or already-read ids succeed with
/// `changed=0`.
#[flutter_rust_bridge::frb(sync)]
pub fn notification_mark_read(notification_id: i64) -> ActionResponse {
    match with_service(|service| service.mark_read(notification_id)) {
        Ok(transitioned) => ActionResponse::success(u64::from(transitioned)),
        Err(message) => {
            warn!(
                "event=ffi_mark_read module=ffi status=error id={} error={}",
                notification_id, message
            );
            ActionResponse::failure(message)
        }
    }
}

/// Marks all of a user's notifications read.
#[flutter_rust_bridge::frb(sync)]
pub fn notifications_mark_all_read(user_id: i64) -> ActionResponse {
    match with_service(|service| service.mark_all_read(user_id)) {
        Ok(changed) => ActionResponse::success(changed as u64),
        Err(message) => {
            warn!(
                "event=ffi_mark_all_read module=ffi status=error user={} error={}",
                user_id, message
            );
            ActionResponse::failure(message)
        }
    }
}

fn resolve_db_path() -> PathBuf {
    DB_PATH
        .get_or_init(|| NotifierConfig::from_env().db_path)
        .clone()
}

fn with_service<T>(
    f: impl FnOnce(&NotificationService<SqliteNotificationStore<'_>>) -> StoreResult<T>,
) -> Result<T, String> {
    let db_path = resolve_db_path();
    let conn = open_db(&db_path).map_err(|err| format!("notification DB open failed: {err}"))?;
    let store = SqliteNotificationStore::try_new(&conn)
        .map_err(|err| format!("notification store init failed: {err}"))?;
    let service = NotificationService::new(store);
    f(&service).map_err(|err| err.to_string())
}

fn to_item(notification: Notification) -> NotificationItem {
    let (related_kind, related_id) = match notification.related {
        Some(entity) => (Some(entity.kind.as_str().to_string()), Some(entity.id)),
        None => (None, None),
    };
    NotificationItem {
        id: notification.id,
        kind: notification.kind.as_tag(),
        title: notification.title,
        message: notification.message,
        priority: notification.priority.as_str().to_string(),
        related_kind,
        related_id,
        created_at_ms: notification.created_at,
        is_read: notification.read_state.is_read(),
        read_at_ms: notification.read_state.read_at(),
    }
}
