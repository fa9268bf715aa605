use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    response::Response,
};

use crate::api::routes::AppState;
use crate::error::{AppError, Result};

/// Far beyond any CloudFormation request body.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Catch-all handler: buffers the body, hands the request to the manager
/// and copies the upstream status, headers and body back to the caller.
pub async fn relay(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AppError::BodyRead(e.to_string()))?;

    let forwarded = state
        .manager
        .relay(parts.method, &parts.uri, &parts.headers, body)
        .await?;

    let mut response = Response::new(Body::from(forwarded.body));
    *response.status_mut() = forwarded.status;
    *response.headers_mut() = forwarded.headers;
    Ok(response)
}
