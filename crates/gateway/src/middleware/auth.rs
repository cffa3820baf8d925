//! Shared-secret check for the scan triggers

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use paperscout_common::auth::verify_trigger;
use paperscout_common::errors::Result;

use crate::AppState;

/// Reject the request with 401 unless it carries the configured bearer secret
pub async fn require_trigger_secret(State(state): State<AppState>, request: Request, next: Next) -> Result<Response> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    verify_trigger(header, state.config.auth.trigger_secret.as_deref())?;
    Ok(next.run(request).await)
}
