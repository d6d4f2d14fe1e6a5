//! Schema-driven payload validation.
//!
//! [`validate`] is a pure function: identical `(spec, payload)` inputs always
//! yield an identical ordered error list. Errors are reported in the order
//! parameters are declared in the spec, then in check order within each
//! parameter, so one parameter can accumulate more than one error.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::schema::{OperationSpec, ParamType};

/// Enumerated validation error codes.
///
/// Codes are stable wire identifiers; callers branch on them rather than on
/// the human description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    /// The operation name is unknown to the schema store.
    #[serde(rename = "VAL0000")]
    OperationNotFound,
    /// A mandatory parameter is missing from the payload.
    #[serde(rename = "VAL0001")]
    MandatoryParamMissing,
    /// An int parameter could not be parsed as an integer.
    #[serde(rename = "VAL0002")]
    IntParseFailure,
    /// A string parameter is shorter than its configured minimum length.
    #[serde(rename = "VAL1001")]
    StringTooShort,
    /// A string parameter is longer than its configured maximum length.
    #[serde(rename = "VAL1002")]
    StringTooLong,
    /// An int parameter is below its configured minimum value.
    #[serde(rename = "VAL2001")]
    IntTooSmall,
    /// An int parameter is above its configured maximum value.
    #[serde(rename = "VAL2002")]
    IntTooLarge,
}

impl ErrorCode {
    /// Wire identifier for this code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::OperationNotFound => "VAL0000",
            ErrorCode::MandatoryParamMissing => "VAL0001",
            ErrorCode::IntParseFailure => "VAL0002",
            ErrorCode::StringTooShort => "VAL1001",
            ErrorCode::StringTooLong => "VAL1002",
            ErrorCode::IntTooSmall => "VAL2001",
            ErrorCode::IntTooLarge => "VAL2002",
        }
    }

    /// Human description attached to every error carrying this code.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ErrorCode::OperationNotFound => "Operation not found.",
            ErrorCode::MandatoryParamMissing => "Mandatory parameter not present in the request.",
            ErrorCode::IntParseFailure => "Value could not be parsed as an integer.",
            ErrorCode::StringTooShort => "String length smaller than needed.",
            ErrorCode::StringTooLong => "String length longer than needed.",
            ErrorCode::IntTooSmall => "Integer number lesser than needed.",
            ErrorCode::IntTooLarge => "Integer number greater than needed.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single constraint violation.
///
/// `param` is absent for whole-operation errors ([`ErrorCode::OperationNotFound`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    pub code: ErrorCode,
    pub description: String,
}

impl ValidationError {
    fn for_param(name: &str, code: ErrorCode) -> Self {
        Self {
            param: Some(name.to_string()),
            code,
            description: code.description().to_string(),
        }
    }

    /// Whole-operation error emitted when the operation name has no schema.
    #[must_use]
    pub fn operation_not_found() -> Self {
        Self {
            param: None,
            code: ErrorCode::OperationNotFound,
            description: ErrorCode::OperationNotFound.description().to_string(),
        }
    }
}

/// Validates a parameter payload against one operation's spec.
///
/// Returns the ordered list of violations; an empty list means the payload is
/// valid. The unknown-operation case (`VAL0000`) is the dispatcher's
/// responsibility, raised via [`ValidationError::operation_not_found`] when
/// the schema-store lookup fails, before this function is ever reached.
#[must_use]
pub fn validate(spec: &OperationSpec, payload: &Map<String, Value>) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for param in &spec.params {
        let Some(value) = payload.get(&param.name) else {
            if param.mandatory {
                errors.push(ValidationError::for_param(
                    &param.name,
                    ErrorCode::MandatoryParamMissing,
                ));
            }
            continue;
        };

        match param.param_type {
            ParamType::String => check_string(param, value, &mut errors),
            ParamType::Int => check_int(param, value, &mut errors),
        }
    }

    errors
}

/// Length checks for a string parameter, applied to the trimmed value.
///
/// Both checks are gated on the presence of the *minimum*-length bound: a
/// schema that configures only `maxLength` never emits `VAL1002`. This
/// asymmetry is carried over from the system this one replaces so existing
/// operation maps keep their observed behavior (see DESIGN.md).
fn check_string(
    param: &crate::schema::ParamSpec,
    value: &Value,
    errors: &mut Vec<ValidationError>,
) {
    let Value::String(raw) = value else {
        // No code exists for a string type mismatch; non-string values
        // pass through unchecked.
        return;
    };
    let Some(bounds) = &param.validation else {
        return;
    };
    let Some(min) = bounds.min_length else {
        return;
    };

    let len = raw.trim().chars().count() as u64;
    if len < min {
        errors.push(ValidationError::for_param(
            &param.name,
            ErrorCode::StringTooShort,
        ));
    }
    if let Some(max) = bounds.max_length {
        if len > max {
            errors.push(ValidationError::for_param(
                &param.name,
                ErrorCode::StringTooLong,
            ));
        }
    }
}

/// Parse and range checks for an int parameter. A parse failure emits
/// `VAL0002` and suppresses the range checks for that parameter.
fn check_int(param: &crate::schema::ParamSpec, value: &Value, errors: &mut Vec<ValidationError>) {
    let Some(parsed) = parse_int(value) else {
        errors.push(ValidationError::for_param(
            &param.name,
            ErrorCode::IntParseFailure,
        ));
        return;
    };

    let Some(bounds) = &param.validation else {
        return;
    };
    if let Some(min) = bounds.min_value {
        if parsed < min {
            errors.push(ValidationError::for_param(
                &param.name,
                ErrorCode::IntTooSmall,
            ));
        }
    }
    if let Some(max) = bounds.max_value {
        if parsed > max {
            errors.push(ValidationError::for_param(
                &param.name,
                ErrorCode::IntTooLarge,
            ));
        }
    }
}

/// Accepts JSON integers directly and strings that parse as `i64` after
/// trimming. Floats, booleans, and structured values are parse failures.
fn parse_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
