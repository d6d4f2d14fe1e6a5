//! Operation schema types and declarative source parsing.
//!
//! An operation map is a JSON document mapping operation names to their
//! parameter contracts:
//!
//! ```json
//! {
//!   "createUser": {
//!     "method": "POST",
//!     "params": [
//!       { "paramName": "email", "type": "string", "mandatory": true,
//!         "validation": { "minLength": 5, "maxLength": 120 } }
//!     ]
//!   }
//! }
//! ```
//!
//! The operation name doubles as the route identifier: the server binds one
//! endpoint at `/{operationName}` per entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Wire type of a single parameter. Only flat scalars are supported;
/// nested objects, arrays, and enums are out of scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Int,
}

/// HTTP method an operation is bound under. Defaults to `POST` when the
/// declarative source omits it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransportMethod {
    #[serde(alias = "get")]
    Get,
    #[default]
    #[serde(alias = "post")]
    Post,
    #[serde(alias = "put")]
    Put,
    #[serde(alias = "delete")]
    Delete,
    #[serde(alias = "patch")]
    Patch,
}

impl TransportMethod {
    /// Canonical uppercase name, as it appears in the declarative source.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TransportMethod::Get => "GET",
            TransportMethod::Post => "POST",
            TransportMethod::Put => "PUT",
            TransportMethod::Delete => "DELETE",
            TransportMethod::Patch => "PATCH",
        }
    }
}

impl std::fmt::Display for TransportMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional constraint bounds for one parameter.
///
/// Length bounds apply to `string` parameters (after trimming), value bounds
/// to `int` parameters. All four are independent and optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParamBounds {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
}

/// Contract for a single named parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name, unique within its operation.
    #[serde(rename = "paramName")]
    pub name: String,
    /// Wire type of the parameter.
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Whether the parameter must be present in every call.
    #[serde(default)]
    pub mandatory: bool,
    /// Optional constraint bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ParamBounds>,
}

/// Declarative contract for one callable operation.
///
/// Parameter order is significant: validation errors are reported in the
/// order parameters are declared here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    /// Transport method the operation is bound under.
    #[serde(default)]
    pub method: TransportMethod,
    /// Ordered parameter contracts.
    #[serde(default)]
    pub params: Vec<ParamSpec>,
}

/// Parsed declarative source: operation name to its spec.
pub type OperationMap = HashMap<String, OperationSpec>;

/// Error raised when the declarative operation source cannot be parsed.
/// Fatal for the owning process: a server must not start serving with a
/// broken operation map.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("malformed operation map: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Parses a declarative operation-map document.
///
/// # Errors
///
/// Returns [`SchemaError::Malformed`] if the source is not valid JSON or does
/// not match the operation-map shape.
pub fn parse_operation_map(source: &str) -> Result<OperationMap, SchemaError> {
    let map: OperationMap = serde_json::from_str(source)?;
    Ok(map)
}
