//! Notification domain model.
//!
//! # Responsibility
//! - Define the per-recipient notification record and its draft shape.
//! - Own the read-state machine (`Unread -> Read`, one way only).
//! - Validate drafts before they reach storage.
//!
//! # Invariants
//! - `id` and `created_at` are assigned by storage, never by callers.
//! - `ReadState::Read` always carries its timestamp; there is no way back to
//!   `Unread`.
//! - `title` and `message` are immutable after creation.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Store-assigned notification identifier; increases in insertion order.
pub type NotificationId = i64;

/// Identifier of a user owned by the external account module.
pub type UserId = i64;

pub const TITLE_MAX_CHARS: usize = 200;
pub const MESSAGE_MAX_CHARS: usize = 2000;

const CUSTOM_TYPE_PREFIX: &str = "custom:";

/// Kind of domain event that produced a notification.
///
/// New event kinds are added as variants. `Custom` is the single extension
/// point for integrations that cannot wait for a release; its name must be a
/// lowercase `[a-z0-9_]+` tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// User was added to a project.
    MemberAdded,
    /// Task was assigned to the user.
    TaskAssigned,
    /// Status of a task the user follows changed.
    StatusChanged,
    /// Task due date is close.
    DeadlineApproaching,
    /// Emitted by diagnostic tooling only.
    DebugTest,
    /// Integration-defined kind.
    Custom(String),
}

impl NotificationType {
    /// Stable storage tag, e.g. `member_added` or `custom:sprint_closed`.
    pub fn as_tag(&self) -> String {
        match self {
            Self::Custom(name) => format!("{CUSTOM_TYPE_PREFIX}{name}"),
            other => other.builtin_tag().unwrap_or_default().to_string(),
        }
    }

    fn builtin_tag(&self) -> Option<&'static str> {
        match self {
            Self::MemberAdded => Some("member_added"),
            Self::TaskAssigned => Some("task_assigned"),
            Self::StatusChanged => Some("status_changed"),
            Self::DeadlineApproaching => Some("deadline_approaching"),
            Self::DebugTest => Some("debug_test"),
            Self::Custom(_) => None,
        }
    }

    fn validate(&self) -> Result<(), NotificationValidationError> {
        if let Self::Custom(name) = self {
            let well_formed = !name.is_empty()
                && name
                    .chars()
                    .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_');
            if !well_formed {
                return Err(NotificationValidationError::InvalidCustomType(name.clone()));
            }
        }
        Ok(())
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_tag())
    }
}

impl FromStr for NotificationType {
    type Err = NotificationValidationError;

    /// Parses a storage tag. Accepts upper-case event names
    /// (`MEMBER_ADDED`) used by the application shells as well.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(name) = trimmed.strip_prefix(CUSTOM_TYPE_PREFIX) {
            let kind = Self::Custom(name.to_string());
            kind.validate()?;
            return Ok(kind);
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "member_added" => Ok(Self::MemberAdded),
            "task_assigned" => Ok(Self::TaskAssigned),
            "status_changed" => Ok(Self::StatusChanged),
            "deadline_approaching" => Ok(Self::DeadlineApproaching),
            "debug_test" => Ok(Self::DebugTest),
            _ => Err(NotificationValidationError::UnknownType(trimmed.to_string())),
        }
    }
}

/// Rendering emphasis. Advisory only; never changes storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Kind of entity a notification deep-links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Task,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Task => "task",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "project" => Some(Self::Project),
            "task" => Some(Self::Task),
            _ => None,
        }
    }
}

/// Reference to the project/task that caused the event.
///
/// The id is opaque to this crate; it is stored and returned verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn project(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Project,
            id: id.into(),
        }
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Task,
            id: id.into(),
        }
    }
}

/// Read state of one notification.
///
/// Replaces a `read` flag plus nullable `read_at` pair so that a read
/// notification without a timestamp cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReadState {
    Unread,
    /// `at` is epoch milliseconds of the first (and only) transition.
    Read { at: i64 },
}

impl ReadState {
    pub fn is_read(self) -> bool {
        matches!(self, Self::Read { .. })
    }

    pub fn read_at(self) -> Option<i64> {
        match self {
            Self::Unread => None,
            Self::Read { at } => Some(at),
        }
    }

    /// Applies the `Unread -> Read` transition.
    ///
    /// Returns `false` and keeps the original timestamp when already read.
    pub fn mark_read(&mut self, at: i64) -> bool {
        match self {
            Self::Unread => {
                *self = Self::Read { at };
                true
            }
            Self::Read { .. } => false,
        }
    }
}

/// Persisted notification as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    /// Serialized as `type` to match the shells' payload naming.
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub related: Option<EntityRef>,
    /// Unix epoch milliseconds, assigned by storage.
    pub created_at: i64,
    pub read_state: ReadState,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_state.is_read()
    }

    pub fn read_at(&self) -> Option<i64> {
        self.read_state.read_at()
    }
}

/// Notification draft handed to storage for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub recipient: UserId,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub related: Option<EntityRef>,
}

impl NewNotification {
    pub fn new(
        recipient: UserId,
        kind: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipient,
            kind,
            title: title.into(),
            message: message.into(),
            priority: Priority::Normal,
            related: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_related(mut self, related: EntityRef) -> Self {
        self.related = Some(related);
        self
    }

    /// Validates the draft without touching storage.
    ///
    /// # Errors
    /// - Non-positive recipient id.
    /// - Blank or oversized title, oversized message.
    /// - Malformed `Custom` type name or blank related entity id.
    pub fn validate(&self) -> Result<(), NotificationValidationError> {
        validate_recipient(self.recipient)?;
        self.kind.validate()?;
        validate_content(&self.title, &self.message)?;
        if let Some(related) = self.related.as_ref() {
            if related.id.trim().is_empty() {
                return Err(NotificationValidationError::InvalidEntityRef);
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_recipient(recipient: UserId) -> Result<(), NotificationValidationError> {
    if recipient <= 0 {
        return Err(NotificationValidationError::InvalidRecipient(recipient));
    }
    Ok(())
}

fn validate_content(title: &str, message: &str) -> Result<(), NotificationValidationError> {
    if title.trim().is_empty() {
        return Err(NotificationValidationError::EmptyTitle);
    }
    let title_chars = title.chars().count();
    if title_chars > TITLE_MAX_CHARS {
        return Err(NotificationValidationError::TitleTooLong(title_chars));
    }
    let message_chars = message.chars().count();
    if message_chars > MESSAGE_MAX_CHARS {
        return Err(NotificationValidationError::MessageTooLong(message_chars));
    }
    Ok(())
}

/// Rejections raised before any storage call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationValidationError {
    /// Emit request carried no recipients.
    NoRecipients,
    InvalidRecipient(UserId),
    /// Type tag does not name a known kind.
    UnknownType(String),
    InvalidCustomType(String),
    EmptyTitle,
    TitleTooLong(usize),
    MessageTooLong(usize),
    InvalidEntityRef,
}

impl Display for NotificationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRecipients => write!(f, "notification requires at least one recipient"),
            Self::InvalidRecipient(id) => write!(f, "invalid recipient user id: {id}"),
            Self::UnknownType(tag) => write!(f, "unknown notification type `{tag}`"),
            Self::InvalidCustomType(name) => write!(
                f,
                "custom notification type `{name}` must match [a-z0-9_]+"
            ),
            Self::EmptyTitle => write!(f, "notification title must not be blank"),
            Self::TitleTooLong(chars) => write!(
                f,
                "notification title has {chars} chars; max is {TITLE_MAX_CHARS}"
            ),
            Self::MessageTooLong(chars) => write!(
                f,
                "notification message has {chars} chars; max is {MESSAGE_MAX_CHARS}"
            ),
            Self::InvalidEntityRef => write!(f, "related entity id must not be blank"),
        }
    }
}

impl Error for NotificationValidationError {}
