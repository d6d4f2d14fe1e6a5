//! Dispatch orchestration: audit-start, validation, handler invocation,
//! audit-finish, response envelope.
//!
//! Failures travel in the envelope's `status` field, not the transport
//! status: a call that fails validation is still an HTTP 200 whose body is
//! `{"status":"ERROR","validationErrors":[...]}`. The only transport-level
//! failure is an unparsable payload, handled before dispatch is reached.

use std::sync::Arc;

use opsgate_core::{validate, ValidationError};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::audit::AuditLedger;
use crate::config::ApiConfig;
use crate::service::handler::{CallContext, HandlerRegistry, RequestMeta};
use crate::service::store::SchemaStore;

/// Shared state for one running server instance: the schema store and
/// handler registry are frozen at startup, the ledger is shared read/write
/// across in-flight calls.
#[derive(Clone)]
pub struct AppState {
    pub schemas: Arc<SchemaStore>,
    pub handlers: Arc<HandlerRegistry>,
    pub ledger: Arc<AuditLedger>,
    pub config: Arc<ApiConfig>,
}

/// Generic error envelope with a human description.
#[must_use]
pub fn error_envelope(description: &str) -> Value {
    json!({ "status": "ERROR", "description": description })
}

/// Envelope carrying an ordered validation-error list.
#[must_use]
pub fn validation_envelope(errors: &[ValidationError]) -> Value {
    json!({ "status": "ERROR", "validationErrors": errors })
}

/// Runs the full per-call sequence for an already-parsed payload and returns
/// the response body. The transport status is always success from here on.
///
/// Sequence: audit-start, schema lookup and validation, handler invocation
/// under the configured timeout, audit-finish, optional followup spawn.
pub async fn dispatch(
    state: &AppState,
    operation: &str,
    meta: RequestMeta,
    payload: Map<String, Value>,
) -> Value {
    let input = Value::Object(payload.clone());
    let key = state.ledger.start(operation, &input);

    let errors = match state.schemas.lookup(operation) {
        None => vec![ValidationError::operation_not_found()],
        Some(spec) => validate(spec, &payload),
    };
    if !errors.is_empty() {
        debug!(operation, count = errors.len(), "validation failed");
        let envelope = validation_envelope(&errors);
        state.ledger.finish(&key, envelope.clone());
        return envelope;
    }

    let Some(handler) = state.handlers.get(operation) else {
        let envelope = error_envelope("operation not registered");
        state.ledger.finish(&key, envelope.clone());
        return envelope;
    };

    let call = CallContext {
        input: payload,
        key: key.clone(),
        meta,
    };
    match tokio::time::timeout(state.config.handler_timeout(), handler.handle(call)).await {
        Ok(outcome) => {
            state.ledger.finish(&key, outcome.body.clone());
            if let Some(followup) = outcome.followup {
                tokio::spawn(followup);
            }
            outcome.body
        }
        Err(_) => {
            warn!(operation, key = %key, "handler exceeded timeout, call abandoned");
            let envelope = error_envelope("operation timed out");
            state.ledger.finish(&key, envelope.clone());
            envelope
        }
    }
}
