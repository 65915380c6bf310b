//! HTTP handlers

pub mod assistant;
pub mod backends;
pub mod status;
