//! Mapping of call outcomes onto HTTP responses.

use crate::domain::error::{RpcError, RpcResult};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shared_types::{SecurityHeaderError, ServiceResponse, SECURITY_RESPONSE_HEADER};
use tracing::{error, warn};

/// Message returned whenever the Core could not be reached in time.
pub const ERROR_GATEWAY_TIMEOUT: &str = "Timeout occured when contacting symbIoTe Core services";

/// Message returned when the `x-auth-*` headers are incomplete.
pub const ERROR_INVALID_SECURITY_HEADERS: &str = "Invalid security headers";

/// Render the outcome of a Core call.
///
/// A reply is returned with the Core service's own status; failures become
/// an envelope with the matching gateway status and no body.
pub fn core_reply<R: ServiceResponse>(result: RpcResult<R>) -> Response {
    match result {
        Ok(reply) => {
            let Some(status) = reply_status(reply.status()) else {
                error!(status = reply.status(), "Core replied with an invalid status");
                let code = StatusCode::INTERNAL_SERVER_ERROR;
                return (
                    code,
                    Json(R::failure(
                        code.as_u16(),
                        format!("Invalid status {} in Core reply", reply.status()),
                    )),
                )
                    .into_response();
            };
            let header = reply
                .service_response()
                .and_then(|token| HeaderValue::from_str(token).ok());
            let mut response = (status, Json(reply)).into_response();
            if let Some(value) = header {
                response.headers_mut().insert(SECURITY_RESPONSE_HEADER, value);
            }
            response
        }
        Err(err) => call_failure::<R>(err),
    }
}

/// HTTP status for a status code carried in a Core reply.
fn reply_status(code: u16) -> Option<StatusCode> {
    if !(100..=599).contains(&code) {
        return None;
    }
    StatusCode::from_u16(code).ok()
}

fn call_failure<R: ServiceResponse>(err: RpcError) -> Response {
    let code = err.status_code();
    let message = if code == StatusCode::GATEWAY_TIMEOUT.as_u16() {
        warn!(error = %err, "Core call failed");
        ERROR_GATEWAY_TIMEOUT.to_string()
    } else {
        error!(error = %err, "Core call failed");
        err.to_string()
    };
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(R::failure(code, message))).into_response()
}

/// 401 answer for requests without a usable security envelope.
pub fn bad_security_headers(err: &SecurityHeaderError) -> Response {
    error!(error = %err, "No proper security headers passed");
    envelope(StatusCode::UNAUTHORIZED, ERROR_INVALID_SECURITY_HEADERS)
}

/// Bodiless status envelope.
pub fn envelope(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "message": message.into(),
            "body": null,
        })),
    )
        .into_response()
}
