//! Scriptbot core services.
//!
//! - [`rate_limiter`]: per-identity sliding-window admission.
//! - [`access`]: owner/admin authority with persistence.
//! - [`session`]: per-identity add/edit interaction state.
//! - [`action`]: typed commands and button payloads.
//! - [`ui`]: transport-neutral replies, menus and deep links.
//! - [`dispatcher`]: routes inbound events through the services.
//!
//! Services are constructed by the caller and injected into the
//! [`dispatcher::Dispatcher`]; nothing here is process-global.

pub mod access;
pub mod action;
pub mod dispatcher;
pub mod rate_limiter;
pub mod session;
pub mod ui;
