//! Notification store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist notification drafts and assign `id` / `created_at`.
//! - Serve per-recipient history pages and the unread badge count.
//! - Apply read-state transitions.
//!
//! # Invariants
//! - Write paths call `NewNotification::validate()` before SQL mutations.
//! - Every operation is one autocommitted statement; nothing holds a lock
//!   across calls.
//! - `created_at` never decreases for a recipient in insertion order.
//! - Mark-read operations only move rows from unread to read, and never fail
//!   on unknown ids or users.

use crate::db::DbError;
use crate::model::notification::{
    EntityKind, EntityRef, NewNotification, Notification, NotificationId, NotificationType,
    NotificationValidationError, Priority, ReadState, UserId,
};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const PAGE_DEFAULT_LIMIT: u32 = 20;
pub const PAGE_LIMIT_MAX: u32 = 100;

/// Current time in epoch milliseconds, evaluated by SQLite.
const NOW_MS_SQL: &str = "CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER)";

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    recipient_user_id,
    type,
    title,
    message,
    priority,
    related_kind,
    related_id,
    created_at,
    is_read,
    read_at
FROM notifications";

const REQUIRED_COLUMNS: &[&str] = &[
    "id",
    "recipient_user_id",
    "type",
    "title",
    "message",
    "priority",
    "related_kind",
    "related_id",
    "created_at",
    "is_read",
    "read_at",
];

pub type StoreResult<T> = Result<T, StoreError>;

/// Store-level error for notification persistence and queries.
#[derive(Debug)]
pub enum StoreError {
    Validation(NotificationValidationError),
    /// Recipient does not exist in `users` (foreign-key violation).
    UnknownRecipient(UserId),
    Db(DbError),
    /// Persisted row cannot be decoded into the domain model.
    InvalidData(String),
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::UnknownRecipient(id) => write!(f, "recipient user not found: {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted notification data: {message}")
            }
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NotificationValidationError> for StoreError {
    fn from(value: NotificationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Offset/limit window over a recipient's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u32,
    /// `0` means "use the default"; values above the max are clamped.
    pub limit: u32,
}

impl PageRequest {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Limit actually applied to the query.
    pub fn applied_limit(&self) -> u32 {
        normalize_page_limit(self.limit)
    }
}

/// Normalizes a page limit according to the history paging contract.
pub fn normalize_page_limit(limit: u32) -> u32 {
    match limit {
        0 => PAGE_DEFAULT_LIMIT,
        value if value > PAGE_LIMIT_MAX => PAGE_LIMIT_MAX,
        value => value,
    }
}

/// Durable notification storage scoped per recipient.
pub trait NotificationStore {
    /// Inserts one notification and returns its store-assigned id.
    fn insert(&self, notification: &NewNotification) -> StoreResult<NotificationId>;
    /// Loads one notification by id.
    fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>>;
    /// Lists a recipient's notifications, most recent first.
    fn user_notifications(
        &self,
        user: UserId,
        page: &PageRequest,
    ) -> StoreResult<Vec<Notification>>;
    /// Counts a recipient's unread notifications.
    fn unread_count(&self, user: UserId) -> StoreResult<u64>;
    /// Marks one notification read. Returns whether a transition happened.
    fn mark_read(&self, id: NotificationId) -> StoreResult<bool>;
    /// Marks every unread notification of a recipient read. Returns the
    /// number of transitioned rows.
    fn mark_all_read(&self, user: UserId) -> StoreResult<usize>;
}

impl<S: NotificationStore + ?Sized> NotificationStore for &S {
    fn insert(&self, notification: &NewNotification) -> StoreResult<NotificationId> {
        (**self).insert(notification)
    }

    fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        (**self).get(id)
    }

    fn user_notifications(
        &self,
        user: UserId,
        page: &PageRequest,
    ) -> StoreResult<Vec<Notification>> {
        (**self).user_notifications(user, page)
    }

    fn unread_count(&self, user: UserId) -> StoreResult<u64> {
        (**self).unread_count(user)
    }

    fn mark_read(&self, id: NotificationId) -> StoreResult<bool> {
        (**self).mark_read(id)
    }

    fn mark_all_read(&self, user: UserId) -> StoreResult<usize> {
        (**self).mark_all_read(user)
    }
}

/// SQLite-backed notification store over a migrated connection.
pub struct SqliteNotificationStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationStore<'conn> {
    /// Constructs a store after checking the notification schema is present.
    ///
    /// # Errors
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the connection
    ///   was not opened through `open_db*`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_store_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl NotificationStore for SqliteNotificationStore<'_> {
    fn insert(&self, notification: &NewNotification) -> StoreResult<NotificationId> {
        notification.validate()?;

        let sql = format!(
            "INSERT INTO notifications (
                recipient_user_id,
                type,
                title,
                message,
                priority,
                related_kind,
                related_id,
                created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                MAX(
                    {NOW_MS_SQL},
                    COALESCE(
                        (SELECT MAX(created_at) FROM notifications WHERE recipient_user_id = ?1),
                        0
                    )
                )
            )
            RETURNING id;"
        );

        let related = notification.related.as_ref();
        let inserted = self.conn.query_row(
            &sql,
            params![
                notification.recipient,
                notification.kind.as_tag(),
                notification.title.as_str(),
                notification.message.as_str(),
                notification.priority.as_str(),
                related.map(|entity| entity.kind.as_str()),
                related.map(|entity| entity.id.as_str()),
            ],
            |row| row.get::<_, NotificationId>(0),
        );

        match inserted {
            Ok(id) => Ok(id),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(StoreError::UnknownRecipient(notification.recipient))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"))?;
        let row = stmt
            .query_row([id], |row| Ok(parse_notification_row(row)))
            .optional()?;
        row.transpose()
    }

    fn user_notifications(
        &self,
        user: UserId,
        page: &PageRequest,
    ) -> StoreResult<Vec<Notification>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTIFICATION_SELECT_SQL}
             WHERE recipient_user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3;"
        ))?;

        let mut rows = stmt.query(params![
            user,
            i64::from(page.applied_limit()),
            i64::from(page.offset),
        ])?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }

        Ok(notifications)
    }

    fn unread_count(&self, user: UserId) -> StoreResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM notifications
             WHERE recipient_user_id = ?1
               AND is_read = 0;",
            [user],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| StoreError::InvalidData(format!("negative unread count `{count}`")))
    }

    fn mark_read(&self, id: NotificationId) -> StoreResult<bool> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE notifications
                 SET
                    is_read = 1,
                    read_at = {NOW_MS_SQL}
                 WHERE id = ?1
                   AND is_read = 0;"
            ),
            [id],
        )?;

        if changed == 0 {
            debug!("event=notification_mark_read module=store status=noop id={id}");
        }
        Ok(changed == 1)
    }

    fn mark_all_read(&self, user: UserId) -> StoreResult<usize> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE notifications
                 SET
                    is_read = 1,
                    read_at = {NOW_MS_SQL}
                 WHERE recipient_user_id = ?1
                   AND is_read = 0;"
            ),
            [user],
        )?;
        Ok(changed)
    }
}

fn parse_notification_row(row: &Row<'_>) -> StoreResult<Notification> {
    let id: NotificationId = row.get("id")?;

    let type_text: String = row.get("type")?;
    let kind = type_text.parse::<NotificationType>().map_err(|_| {
        StoreError::InvalidData(format!(
            "invalid type `{type_text}` in notifications.type (id={id})"
        ))
    })?;

    let priority_text: String = row.get("priority")?;
    let priority = Priority::parse(&priority_text).ok_or_else(|| {
        StoreError::InvalidData(format!(
            "invalid priority `{priority_text}` in notifications.priority (id={id})"
        ))
    })?;

    let related = match (
        row.get::<_, Option<String>>("related_kind")?,
        row.get::<_, Option<String>>("related_id")?,
    ) {
        (None, None) => None,
        (Some(kind_text), Some(entity_id)) => {
            let kind = EntityKind::parse(&kind_text).ok_or_else(|| {
                StoreError::InvalidData(format!(
                    "invalid related kind `{kind_text}` in notifications.related_kind (id={id})"
                ))
            })?;
            Some(EntityRef {
                kind,
                id: entity_id,
            })
        }
        _ => {
            return Err(StoreError::InvalidData(format!(
                "half-set related entity in notification {id}"
            )));
        }
    };

    let read_state = match (
        row.get::<_, i64>("is_read")?,
        row.get::<_, Option<i64>>("read_at")?,
    ) {
        (0, None) => ReadState::Unread,
        (1, Some(at)) => ReadState::Read { at },
        (flag, at) => {
            return Err(StoreError::InvalidData(format!(
                "inconsistent read state is_read={flag} read_at={at:?} (id={id})"
            )));
        }
    };

    Ok(Notification {
        id,
        recipient: row.get("recipient_user_id")?,
        kind,
        title: row.get("title")?,
        message: row.get("message")?,
        priority,
        related,
        created_at: row.get("created_at")?,
        read_state,
    })
}

fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY
    )
}

fn ensure_store_connection_ready(conn: &Connection) -> StoreResult<()> {
    if !table_exists(conn, "notifications")? {
        return Err(StoreError::MissingRequiredTable("notifications"));
    }

    for &column in REQUIRED_COLUMNS {
        if !table_has_column(conn, "notifications", column)? {
            return Err(StoreError::MissingRequiredColumn {
                table: "notifications",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{normalize_page_limit, PageRequest, PAGE_DEFAULT_LIMIT, PAGE_LIMIT_MAX};

    #[test]
    fn page_limit_defaults_and_clamps() {
        assert_eq!(normalize_page_limit(0), PAGE_DEFAULT_LIMIT);
        assert_eq!(normalize_page_limit(7), 7);
        assert_eq!(normalize_page_limit(10_000), PAGE_LIMIT_MAX);
        assert_eq!(PageRequest::new(4, 0).applied_limit(), PAGE_DEFAULT_LIMIT);
    }
}
