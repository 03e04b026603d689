//! Audit trail of every create, update and delete.
//!
//! Services record entries through [`service::AuditService`] on the same
//! transaction as the change itself; the HTTP surface only reads.

pub mod controller;
pub mod model;
pub mod router;
pub mod service;

pub use router::init_audit_logs_router;
