//! fleetdesk - device fleet and maintenance ticket console
//!
//! Library side of the `fleetdesk` binary: the REST data layer, view
//! stores, the ticket lifecycle, and the async operation reconciler that
//! ties mutation outcomes back to whoever issued them.

pub mod api;
pub mod auth;
pub mod config;
pub mod lifecycle;
pub mod logging;
pub mod models;
pub mod operation;
pub mod store;
