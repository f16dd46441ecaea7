//! HTTP request handlers for the OAC API.

pub mod catalogs;
pub mod health;
pub mod query;
pub mod reload;
