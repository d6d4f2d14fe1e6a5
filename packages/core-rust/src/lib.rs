//! Opsgate core: operation schemas, declarative source parsing, and the
//! schema-driven validation engine.

pub mod schema;
pub mod validate;

pub use schema::{
    parse_operation_map, OperationMap, OperationSpec, ParamBounds, ParamSpec, ParamType,
    SchemaError, TransportMethod,
};
pub use validate::{validate, ErrorCode, ValidationError};
