//! Offer API handlers
//!
//! GET /offers, POST /offers, and the single-resource transition
//! endpoints. The caller's identity arrives in the `X-User-Id` header,
//! stamped by the auth proxy in front of this service; the engine then
//! derives the caller's side of each offer from the stored parties, never
//! from anything else in the request.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::models::offer::{
    CreateOfferRequest, ErrorResponse, GetOffersResponse, OfferResponse, OffersQuery,
};
use crate::services::escrow::EscrowError;
use crate::AppState;

/// Max offers a single user may create per minute
const OFFER_CREATE_LIMIT_PER_MINUTE: usize = 5;

/// Per-user rate limit tracking for offer creation
struct OfferRateLimiter {
    buckets: HashMap<i32, Vec<Instant>>,
}

impl OfferRateLimiter {
    fn new() -> Self {
        Self {
            buckets: HashMap::new(),
        }
    }

    /// Check if the user may create another offer and record it if so
    fn check_and_record(&mut self, user_id: i32) -> bool {
        let now = Instant::now();
        let one_minute_ago = now - std::time::Duration::from_secs(60);

        let timestamps = self.buckets.entry(user_id).or_default();
        timestamps.retain(|t| *t > one_minute_ago);

        if timestamps.len() >= OFFER_CREATE_LIMIT_PER_MINUTE {
            return false;
        }

        timestamps.push(now);
        true
    }
}

lazy_static::lazy_static! {
    static ref RATE_LIMITER: Arc<Mutex<OfferRateLimiter>> = Arc::new(Mutex::new(OfferRateLimiter::new()));
}

/// Resolve the authenticated caller from the upstream-injected header
pub(crate) fn require_user(
    headers: &HeaderMap,
) -> Result<i32, (StatusCode, Json<ErrorResponse>)> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i32>().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Missing or invalid X-User-Id header".to_string(),
                }),
            )
        })
}

/// Map engine errors onto the API's status-code contract: 403 for the
/// wrong person, 409 for the wrong time, 404 for invisible resources,
/// 502 for a gateway that would not answer.
pub(crate) fn escrow_error_response(err: EscrowError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        EscrowError::Forbidden => StatusCode::FORBIDDEN,
        EscrowError::InvalidTransition { .. } => StatusCode::CONFLICT,
        EscrowError::NotFound => StatusCode::NOT_FOUND,
        EscrowError::AlreadyOpen => StatusCode::CONFLICT,
        EscrowError::Upstream(_) => StatusCode::BAD_GATEWAY,
        EscrowError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "Offer request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// List the caller's offers
///
/// GET /offers?page=&status=
///
/// Returns the fixed paging envelope
/// `{ current_page, data, last_page, total }`, newest offers first,
/// optionally narrowed to one status. Pages past the end come back with
/// an empty data set.
pub async fn list_offers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<OffersQuery>,
) -> Result<Json<GetOffersResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = require_user(&headers)?;

    let status = query.validate().map_err(|e| {
        warn!(error = %e, "Invalid offers query");
        (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e }))
    })?;

    let response = state
        .escrow
        .list_offers(&state.db, caller, query.page(), status)
        .await
        .map_err(escrow_error_response)?;

    info!(
        caller,
        page = response.current_page,
        total = response.total,
        "Offers listed"
    );
    Ok(Json(response))
}

/// Fetch one offer as seen by the caller
///
/// GET /offers/{id}
pub async fn get_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(offer_id): Path<i32>,
) -> Result<Json<OfferResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = require_user(&headers)?;
    let response = state
        .escrow
        .get_offer(&state.db, offer_id, caller)
        .await
        .map_err(escrow_error_response)?;
    Ok(Json(response))
}

/// Buyer proposes a price on a product
///
/// POST /offers
///
/// # Request Body
///
/// ```json
/// {
///   "product_id": 12,
///   "amount": 5000,
///   "description": "Two crates, delivered Friday"
/// }
/// ```
pub async fn create_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateOfferRequest>,
) -> Result<Json<OfferResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = require_user(&headers)?;
    let correlation_id = uuid::Uuid::new_v4().to_string();

    let allowed = {
        let mut limiter = RATE_LIMITER.lock().await;
        limiter.check_and_record(caller)
    };
    if !allowed {
        warn!(caller, correlation_id = %correlation_id, "Offer creation rate limited");
        return Err((
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                error: "Too many offers, try again shortly".to_string(),
            }),
        ));
    }

    let amount = Decimal::try_from(payload.amount).ok().filter(|a| a.is_sign_positive() && !a.is_zero());
    let Some(amount) = amount else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "amount must be greater than zero".to_string(),
            }),
        ));
    };

    info!(
        caller,
        correlation_id = %correlation_id,
        product_id = payload.product_id,
        amount = %amount,
        "Offer creation request received"
    );

    let response = state
        .escrow
        .create_offer(
            &state.db,
            caller,
            payload.product_id,
            amount,
            payload.description,
        )
        .await
        .map_err(escrow_error_response)?;

    Ok(Json(response))
}

/// Seller accepts a pending offer; the payment transaction opens in the
/// same request
///
/// GET /offers/accept/{id}
pub async fn accept_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(offer_id): Path<i32>,
) -> Result<Json<OfferResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = require_user(&headers)?;
    let response = state
        .escrow
        .accept(&state.db, &state.payments, offer_id, caller)
        .await
        .map_err(escrow_error_response)?;
    Ok(Json(response))
}

/// Seller declines a pending offer
///
/// DELETE /offers/reject/{id}
pub async fn reject_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(offer_id): Path<i32>,
) -> Result<Json<OfferResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = require_user(&headers)?;
    let response = state
        .escrow
        .reject(&state.db, offer_id, caller)
        .await
        .map_err(escrow_error_response)?;
    Ok(Json(response))
}

/// Either party withdraws a pending offer
///
/// POST /offers/cancel/{id}
pub async fn cancel_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(offer_id): Path<i32>,
) -> Result<Json<OfferResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = require_user(&headers)?;
    let response = state
        .escrow
        .cancel(&state.db, offer_id, caller)
        .await
        .map_err(escrow_error_response)?;
    Ok(Json(response))
}

/// Either party escalates an in-escrow offer
///
/// POST /offers/dispute/{id}
pub async fn dispute_offer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(offer_id): Path<i32>,
) -> Result<Json<OfferResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller = require_user(&headers)?;
    let response = state
        .escrow
        .dispute(&state.db, offer_id, caller)
        .await
        .map_err(escrow_error_response)?;
    Ok(Json(response))
}
