//! Shared library for the wheel lending backend
//!
//! Holds the pieces with real invariants: phone canonicalization,
//! sequential prefixed ID generation, the header-addressed tabular store,
//! and the member registry reconciler. The HTTP surface lives in wlib-api.

pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod phone;
pub mod registry;
pub mod store;

pub use error::{Error, Result};
