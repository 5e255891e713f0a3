//! Database layer: logical table names and schema initialization

pub mod init;

pub use init::{init_database, init_memory_database};

/// Canonical member registry
pub const MEMBERS: &str = "members";
/// Lendable wheels
pub const INVENTORY: &str = "inventory";
/// Append-only review log
pub const REVIEWS: &str = "reviews";
/// Optional signup audit trail
pub const SIGNUPS: &str = "signups";
/// Raw registration intake, reconciled into `members`
pub const REGISTRATIONS: &str = "registrations";
