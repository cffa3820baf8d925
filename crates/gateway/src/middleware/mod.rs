//! Middleware module

pub mod auth;
pub mod metrics;
pub mod rate_limit;
