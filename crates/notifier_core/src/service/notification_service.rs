//! Notification use-case service.
//!
//! # Responsibility
//! - Translate domain events into one notification per recipient.
//! - Own event-to-content mapping (templates, priority, deep-link target).
//! - Expose the polling queries and read-state commands used by the shells.
//!
//! # Invariants
//! - Validation of every recipient draft happens before the first insert.
//! - Fan-out is N independent inserts; one failing recipient never prevents
//!   delivery to the others.
//! - Repeated identical events produce repeated notifications (no
//!   de-duplication key exists at the call sites).
//! - The service keeps no copies of persisted state between calls.
//!
//! # Failure isolation
//! Event sources call this service only after their own action committed.
//! `emit` reports failures for logging, and `emit_best_effort` swallows them
//! after logging, so a notification failure can never unwind that action.

use crate::model::notification::{
    validate_recipient, EntityRef, NewNotification, Notification, NotificationId,
    NotificationType, NotificationValidationError, Priority, UserId,
};
use crate::repo::notification_store::{NotificationStore, PageRequest, StoreError, StoreResult};
use crate::service::templates::render_template;
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const DEADLINE_URGENT_WITHIN_HOURS: u32 = 24;

/// Request model for one fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitRequest {
    pub recipients: Vec<UserId>,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub related: Option<EntityRef>,
}

impl EmitRequest {
    fn draft_for(&self, recipient: UserId) -> NewNotification {
        NewNotification {
            recipient,
            kind: self.kind.clone(),
            title: self.title.clone(),
            message: self.message.clone(),
            priority: self.priority,
            related: self.related.clone(),
        }
    }
}

/// One successfully written notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: UserId,
    pub id: NotificationId,
}

/// One recipient whose insert failed.
#[derive(Debug)]
pub struct FailedDelivery {
    pub recipient: UserId,
    pub error: StoreError,
}

/// Per-recipient outcome of a fan-out where at least one insert failed.
#[derive(Debug)]
pub struct PartialFailure {
    pub delivered: Vec<Delivery>,
    pub failed: Vec<FailedDelivery>,
}

impl PartialFailure {
    pub fn delivered_ids(&self) -> Vec<NotificationId> {
        self.delivered.iter().map(|delivery| delivery.id).collect()
    }

    pub fn failed_recipients(&self) -> Vec<UserId> {
        self.failed.iter().map(|failure| failure.recipient).collect()
    }
}

/// Errors from `NotificationService::emit`.
#[derive(Debug)]
pub enum EmitError {
    /// Request rejected before any storage call; nothing was written.
    Validation(NotificationValidationError),
    /// Some (possibly all) recipients failed; the rest were written.
    Partial(PartialFailure),
}

impl Display for EmitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Partial(partial) => {
                write!(
                    f,
                    "notification delivery failed for {} of {} recipient(s)",
                    partial.failed.len(),
                    partial.failed.len() + partial.delivered.len()
                )?;
                for failure in &partial.failed {
                    write!(f, "; user {}: {}", failure.recipient, failure.error)?;
                }
                Ok(())
            }
        }
    }
}

impl Error for EmitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Partial(partial) => partial
                .failed
                .first()
                .map(|failure| &failure.error as &(dyn Error + 'static)),
        }
    }
}

impl From<NotificationValidationError> for EmitError {
    fn from(value: NotificationValidationError) -> Self {
        Self::Validation(value)
    }
}

/// One page of a recipient's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPage {
    /// Sorted by `created_at DESC, id DESC`.
    pub items: Vec<Notification>,
    pub offset: u32,
    /// Effective normalized limit used by the query.
    pub applied_limit: u32,
}

/// A user was added to a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberAdded {
    pub recipients: Vec<UserId>,
    pub actor_name: String,
    pub project_id: String,
    pub project_name: String,
}

/// A task was assigned to one or more users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskAssigned {
    pub assignees: Vec<UserId>,
    pub actor_name: String,
    pub task_id: String,
    pub task_title: String,
    pub project_name: String,
}

/// A task moved between workflow statuses.
///
/// Status labels belong to the task module and are rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChanged {
    pub recipients: Vec<UserId>,
    pub actor_name: String,
    pub task_id: String,
    pub task_title: String,
    pub from_status: String,
    pub to_status: String,
}

/// A task's due date is close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlineApproaching {
    pub recipients: Vec<UserId>,
    pub task_id: String,
    pub task_title: String,
    /// Whole hours left until the due date, computed by the scheduler.
    pub due_in_hours: u32,
}

/// Notification service facade over a store implementation.
pub struct NotificationService<S: NotificationStore> {
    store: S,
}

impl<S: NotificationStore> NotificationService<S> {
    /// Creates a service using the provided store implementation.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Fans one event out to every recipient.
    ///
    /// # Contract
    /// - Returns ids in recipient order when every insert succeeded.
    /// - Duplicate recipient ids are collapsed; first occurrence wins.
    ///
    /// # Errors
    /// - `EmitError::Validation` when any draft is invalid; nothing written.
    /// - `EmitError::Partial` when at least one insert failed.
    pub fn emit(&self, request: &EmitRequest) -> Result<Vec<NotificationId>, EmitError> {
        let started_at = Instant::now();
        let kind = request.kind.as_tag();
        let drafts = match prepare_drafts(request) {
            Ok(drafts) => drafts,
            Err(err) => {
                warn!(
                    "event=notification_emit module=service status=rejected kind={} recipients={} error={}",
                    kind,
                    request.recipients.len(),
                    err
                );
                return Err(err.into());
            }
        };

        let mut delivered = Vec::with_capacity(drafts.len());
        let mut failed = Vec::new();
        for draft in &drafts {
            match self.store.insert(draft) {
                Ok(id) => delivered.push(Delivery {
                    recipient: draft.recipient,
                    id,
                }),
                Err(error) => {
                    warn!(
                        "event=notification_insert module=service status=error kind={} recipient={} error={}",
                        kind, draft.recipient, error
                    );
                    failed.push(FailedDelivery {
                        recipient: draft.recipient,
                        error,
                    });
                }
            }
        }

        info!(
            "event=notification_emit module=service status={} kind={} recipients={} delivered={} failed={} duration_ms={}",
            if failed.is_empty() { "ok" } else { "partial" },
            kind,
            drafts.len(),
            delivered.len(),
            failed.len(),
            started_at.elapsed().as_millis()
        );

        if failed.is_empty() {
            Ok(delivered.into_iter().map(|delivery| delivery.id).collect())
        } else {
            Err(EmitError::Partial(PartialFailure { delivered, failed }))
        }
    }

    /// Fire-and-forget variant for event sources.
    ///
    /// Never returns an error; failures are logged and only the ids that were
    /// written are returned.
    pub fn emit_best_effort(&self, request: &EmitRequest) -> Vec<NotificationId> {
        match self.emit(request) {
            Ok(ids) => ids,
            Err(EmitError::Validation(err)) => {
                warn!(
                    "event=notification_best_effort module=service status=dropped kind={} error={}",
                    request.kind.as_tag(),
                    err
                );
                Vec::new()
            }
            Err(EmitError::Partial(partial)) => {
                warn!(
                    "event=notification_best_effort module=service status=partial kind={} failed_recipients={:?}",
                    request.kind.as_tag(),
                    partial.failed_recipients()
                );
                partial.delivered_ids()
            }
        }
    }

    /// Notifies users that they were added to a project.
    pub fn member_added(&self, event: &MemberAdded) -> Result<Vec<NotificationId>, EmitError> {
        let bindings = [
            ("actor", event.actor_name.as_str()),
            ("project", event.project_name.as_str()),
        ];
        self.emit(&EmitRequest {
            recipients: event.recipients.clone(),
            kind: NotificationType::MemberAdded,
            title: render_template("Added to {project}", &bindings),
            message: render_template("{actor} added you to {project}", &bindings),
            priority: Priority::Normal,
            related: Some(EntityRef::project(event.project_id.clone())),
        })
    }

    /// Notifies assignees about a new task assignment.
    pub fn task_assigned(&self, event: &TaskAssigned) -> Result<Vec<NotificationId>, EmitError> {
        let bindings = [
            ("actor", event.actor_name.as_str()),
            ("task", event.task_title.as_str()),
            ("project", event.project_name.as_str()),
        ];
        self.emit(&EmitRequest {
            recipients: event.assignees.clone(),
            kind: NotificationType::TaskAssigned,
            title: render_template("New task: {task}", &bindings),
            message: render_template("{actor} assigned you \"{task}\" in {project}", &bindings),
            priority: Priority::High,
            related: Some(EntityRef::task(event.task_id.clone())),
        })
    }

    /// Notifies followers that a task changed status.
    pub fn status_changed(&self, event: &StatusChanged) -> Result<Vec<NotificationId>, EmitError> {
        let bindings = [
            ("actor", event.actor_name.as_str()),
            ("task", event.task_title.as_str()),
            ("from", event.from_status.as_str()),
            ("to", event.to_status.as_str()),
        ];
        self.emit(&EmitRequest {
            recipients: event.recipients.clone(),
            kind: NotificationType::StatusChanged,
            title: render_template("{task} is now {to}", &bindings),
            message: render_template("{actor} moved \"{task}\" from {from} to {to}", &bindings),
            priority: Priority::Normal,
            related: Some(EntityRef::task(event.task_id.clone())),
        })
    }

    /// Warns recipients that a task is about to be due.
    ///
    /// Uses `Urgent` priority inside the last day, `High` before that.
    pub fn deadline_approaching(
        &self,
        event: &DeadlineApproaching,
    ) -> Result<Vec<NotificationId>, EmitError> {
        let hours = event.due_in_hours.to_string();
        let bindings = [("task", event.task_title.as_str()), ("hours", hours.as_str())];
        let priority = if event.due_in_hours <= DEADLINE_URGENT_WITHIN_HOURS {
            Priority::Urgent
        } else {
            Priority::High
        };
        self.emit(&EmitRequest {
            recipients: event.recipients.clone(),
            kind: NotificationType::DeadlineApproaching,
            title: render_template("Deadline approaching: {task}", &bindings),
            message: render_template("\"{task}\" is due in {hours} hour(s)", &bindings),
            priority,
            related: Some(EntityRef::task(event.task_id.clone())),
        })
    }

    /// Sends a diagnostic notification to one user.
    pub fn debug_test(&self, user: UserId) -> Result<Vec<NotificationId>, EmitError> {
        self.emit(&EmitRequest {
            recipients: vec![user],
            kind: NotificationType::DebugTest,
            title: "Test notification".to_string(),
            message: "This notification was sent from diagnostics.".to_string(),
            priority: Priority::Low,
            related: None,
        })
    }

    /// Gets one notification by id.
    pub fn get(&self, id: NotificationId) -> StoreResult<Option<Notification>> {
        self.store.get(id)
    }

    /// Lists one page of a user's notifications, most recent first.
    pub fn user_notifications(
        &self,
        user: UserId,
        offset: u32,
        limit: u32,
    ) -> StoreResult<NotificationPage> {
        let page = PageRequest::new(offset, limit);
        let items = self.store.user_notifications(user, &page)?;
        Ok(NotificationPage {
            items,
            offset,
            applied_limit: page.applied_limit(),
        })
    }

    /// Returns the badge value for a user.
    pub fn unread_count(&self, user: UserId) -> StoreResult<u64> {
        self.store.unread_count(user)
    }

    /// Marks one notification read. Unknown or already-read ids are no-ops.
    pub fn mark_read(&self, id: NotificationId) -> StoreResult<bool> {
        let transitioned = self.store.mark_read(id)?;
        info!(
            "event=notification_mark_read module=service status=ok id={} transitioned={}",
            id, transitioned
        );
        Ok(transitioned)
    }

    /// Marks every unread notification of a user read.
    pub fn mark_all_read(&self, user: UserId) -> StoreResult<usize> {
        let changed = self.store.mark_all_read(user)?;
        info!(
            "event=notification_mark_all_read module=service status=ok user={} changed={}",
            user, changed
        );
        Ok(changed)
    }
}

fn prepare_drafts(
    request: &EmitRequest,
) -> Result<Vec<NewNotification>, NotificationValidationError> {
    if request.recipients.is_empty() {
        return Err(NotificationValidationError::NoRecipients);
    }

    let mut seen = HashSet::with_capacity(request.recipients.len());
    let mut drafts = Vec::with_capacity(request.recipients.len());
    for &recipient in &request.recipients {
        validate_recipient(recipient)?;
        if !seen.insert(recipient) {
            continue;
        }
        let draft = request.draft_for(recipient);
        draft.validate()?;
        drafts.push(draft);
    }
    Ok(drafts)
}
