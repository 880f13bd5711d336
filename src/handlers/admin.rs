//! Admin escrow endpoints: dashboard counters and dispute adjudication
//!
//! Protected by the operations API key in the `X-API-Key` header. An
//! instance started without `ADMIN_API_KEY` keeps these endpoints locked.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use tracing::{info, warn};

use crate::handlers::offer::escrow_error_response;
use crate::models::admin::{EscrowStatsResponse, ResolveRequest, ResolveResponse};
use crate::models::offer::ErrorResponse;
use crate::AppState;

fn require_api_key(
    headers: &HeaderMap,
    expected: &str,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let provided = headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok());
    if expected.is_empty() || provided != Some(expected) {
        warn!("Admin request with missing or invalid API key");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid API key".to_string(),
            }),
        ));
    }
    Ok(())
}

/// Escrow activity counters for the dashboard overview
///
/// GET /admin/escrow/stats
pub async fn escrow_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<EscrowStatsResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_api_key(&headers, &state.admin_api_key)?;

    let stats = state.stats.get_stats(&state.db).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to load escrow stats");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Database error: {}", e),
            }),
        )
    })?;

    Ok(Json(stats))
}

/// Adjudicate a disputed offer to `success` or `failed`
///
/// POST /admin/offers/{id}/resolve
///
/// # Request Body
///
/// ```json
/// { "outcome": "failed" }
/// ```
pub async fn resolve_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(offer_id): Path<i32>,
    Json(payload): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, (StatusCode, Json<ErrorResponse>)> {
    require_api_key(&headers, &state.admin_api_key)?;

    let status = state
        .escrow
        .resolve(&state.db, offer_id, payload.outcome)
        .await
        .map_err(escrow_error_response)?;

    info!(offer_id, status = %status, "Offer dispute adjudicated");
    Ok(Json(ResolveResponse {
        id: offer_id,
        status,
    }))
}
