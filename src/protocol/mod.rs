//! Wire-stable data model: license records, signed assertions, offline
//! bundles, and audit entries.

pub mod models;
