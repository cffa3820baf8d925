//! Discovery read handler

use axum::{extract::State, http::StatusCode, Json};
use paperscout_common::models::DiscoveriesView;
use paperscout_discovery::get_discoveries;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct DiscoveriesResponse {
    #[serde(flatten)]
    pub view: DiscoveriesView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// List stored discoveries. A store failure still answers with an empty
/// list, flagged by `error` and a 503.
pub async fn list_discoveries(State(state): State<AppState>) -> (StatusCode, Json<DiscoveriesResponse>) {
    match get_discoveries(state.store.as_ref()).await {
        Ok(view) => (StatusCode::OK, Json(DiscoveriesResponse { view, error: None })),
        Err(e) => {
            tracing::error!(error = %e, code = ?e.code(), "Failed to read discoveries");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(DiscoveriesResponse {
                    view: DiscoveriesView::default(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}
