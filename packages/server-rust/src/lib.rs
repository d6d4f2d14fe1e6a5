//! Opsgate server: declaratively described operations dispatched over HTTP,
//! with schema-driven validation and a correlation-keyed audit ledger.

pub mod audit;
pub mod config;
pub mod network;
pub mod service;

pub use audit::{AuditLedger, AuditLog, AuditRecord, CorrelationKey, DurationParts};
pub use config::{ApiConfig, ConfigError};
pub use network::ApiModule;
pub use service::{
    handler_fn, CallContext, HandlerOutcome, HandlerRegistry, OperationHandler, RequestMeta,
    SchemaStore,
};
