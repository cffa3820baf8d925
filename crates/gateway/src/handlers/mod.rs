//! API handlers module

pub mod discoveries;
pub mod health;
pub mod scan;
