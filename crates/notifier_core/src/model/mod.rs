//! Domain model for per-recipient notifications.
//!
//! # Responsibility
//! - Define canonical data structures used by store and service layers.
//!
//! # Invariants
//! - Every notification belongs to exactly one recipient.
//! - Read state only moves from unread to read.

pub mod notification;
