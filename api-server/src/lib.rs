//! HTTP façade for the share relay.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod validate;
