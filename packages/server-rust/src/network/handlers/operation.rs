//! Transport-facing operation handler: body parsing and payload recovery.
//!
//! The dispatcher works on parsed payloads; this module owns the step
//! between the wire and the dispatcher. A body that cannot be recovered as
//! a JSON object is answered 406 with a generic error envelope, and no
//! audit record is started for it.

use axum::extract::Request;
use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::service::{dispatch, AppState, RequestMeta};

/// Marker error: the body could not be recovered as a structured payload.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct NotAcceptable;

/// Recovers a JSON-object payload from the raw body.
///
/// - An empty body is an empty payload.
/// - A JSON object is used as-is.
/// - If JSON parsing fails and the declared content type is not JSON, the
///   body is loosely parsed as a form and the *first field name* is
///   reinterpreted as a JSON string. Clients that serialize JSON into a
///   form body end up with the whole document as the first key.
pub(crate) fn parse_payload(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<Map<String, Value>, NotAcceptable> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(payload)) => return Ok(payload),
        Ok(_) => return Err(NotAcceptable),
        Err(_) => {}
    }

    let declared_json = content_type.is_some_and(|ct| ct.contains("application/json"));
    if declared_json {
        return Err(NotAcceptable);
    }

    let fields: Vec<(String, String)> =
        serde_urlencoded::from_bytes(body).map_err(|_| NotAcceptable)?;
    let first_field = fields.into_iter().next().ok_or(NotAcceptable)?.0;
    match serde_json::from_str::<Value>(&first_field) {
        Ok(Value::Object(payload)) => Ok(payload),
        _ => Err(NotAcceptable),
    }
}

/// Axum entry point for one bound operation. Reads the body, recovers the
/// payload, and hands off to [`dispatch`]; the dispatch result always
/// travels with a success transport status.
pub async fn operation_handler(state: AppState, operation: String, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let Ok(bytes) = axum::body::to_bytes(body, state.config.max_body_bytes).await else {
        return not_acceptable();
    };
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let Ok(payload) = parse_payload(content_type.as_deref(), &bytes) else {
        debug!(%operation, "unparsable request body");
        return not_acceptable();
    };

    let meta = RequestMeta {
        method: parts.method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
    };
    let body = dispatch(&state, &operation, meta, payload).await;
    Json(body).into_response()
}

fn not_acceptable() -> Response {
    (
        StatusCode::NOT_ACCEPTABLE,
        Json(json!({ "status": "ERROR" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_is_an_empty_payload() {
        assert!(parse_payload(None, b"").unwrap().is_empty());
        assert!(parse_payload(Some("application/json"), b"  \n").unwrap().is_empty());
    }

    #[test]
    fn json_object_body_is_used_directly() {
        let payload = parse_payload(
            Some("application/json"),
            br#"{ "email": "ada@example.com" }"#,
        )
        .unwrap();
        assert_eq!(payload["email"], "ada@example.com");
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert_eq!(
            parse_payload(Some("application/json"), b"[1, 2]"),
            Err(NotAcceptable)
        );
        assert_eq!(parse_payload(Some("application/json"), b"42"), Err(NotAcceptable));
    }

    #[test]
    fn malformed_json_with_json_content_type_is_rejected() {
        assert_eq!(
            parse_payload(Some("application/json"), b"{ nope"),
            Err(NotAcceptable)
        );
    }

    #[test]
    fn form_body_first_field_name_is_reinterpreted_as_json() {
        let body =
            serde_urlencoded::to_string([(r#"{"email":"ada@example.com"}"#, "")]).unwrap();
        let payload = parse_payload(
            Some("application/x-www-form-urlencoded"),
            body.as_bytes(),
        )
        .unwrap();
        assert_eq!(payload["email"], "ada@example.com");
    }

    #[test]
    fn unrecoverable_form_body_is_rejected() {
        assert_eq!(
            parse_payload(Some("text/plain"), b"just some text"),
            Err(NotAcceptable)
        );
        assert_eq!(
            parse_payload(Some("application/x-www-form-urlencoded"), b"key=value"),
            Err(NotAcceptable)
        );
    }

    #[test]
    fn missing_content_type_counts_as_non_json() {
        let body = serde_urlencoded::to_string([(r#"{"n":1}"#, "")]).unwrap();
        let payload = parse_payload(None, body.as_bytes()).unwrap();
        assert_eq!(payload["n"], 1);
    }
}
