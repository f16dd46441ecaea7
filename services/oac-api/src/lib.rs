//! OAC API Service Library
//!
//! HTTP front end for the Open Astronomy Catalog query engine: routing,
//! configuration, catalog loading and snapshot reloads.

pub mod app;
pub mod config;
pub mod content_negotiation;
pub mod handlers;
pub mod loader;
pub mod state;
