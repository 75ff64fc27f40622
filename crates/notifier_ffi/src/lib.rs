//! Flutter-facing binding for the notification surface (badge + list).

pub mod api;
