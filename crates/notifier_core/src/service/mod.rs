//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into event-level notification APIs.
//! - Keep the application shells decoupled from storage details.

pub mod notification_service;
pub mod templates;
