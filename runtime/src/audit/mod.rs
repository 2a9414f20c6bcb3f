//! Attempt auditing.

pub mod logger;

pub use logger::{AuditLogger, AuditRecord};
