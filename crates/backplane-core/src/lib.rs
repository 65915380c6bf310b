//! backplane-core - Core traits and types for multi-backend status aggregation
//!
//! This crate provides the abstractions shared by every data store backend
//! (key-value, relational, search, vector): the probe and executor traits, the
//! status and summary models, the command grammars and the error taxonomy.

pub mod backend;
pub mod command;
pub mod error;
pub mod models;

pub use backend::{BackendProbe, QueryExecutor, DEFAULT_PROBE_TIMEOUT};
pub use command::{
    Command, CommandSpec, PriceRange, SearchField, DEFAULT_FILTER_LIMIT, MAX_FILTER_LIMIT,
};
pub use error::{BackendError, BackendResult};
pub use models::*;
