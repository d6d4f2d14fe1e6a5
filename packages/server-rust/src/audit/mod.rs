//! Call auditing: correlation-keyed ledger and the append-only event stream.

pub mod ledger;
pub mod log;

pub use ledger::{AuditLedger, AuditRecord, CorrelationKey, DurationParts};
pub use log::AuditLog;
