//! Payment gateway webhook handler
//!
//! The gateway posts a pay-confirmation here once the buyer completes the
//! hosted checkout. Deliveries are at-least-once, so the confirmation
//! path is idempotent end to end; anything we acknowledge with a 2xx the
//! gateway stops retrying.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::offer::ErrorResponse;
use crate::services::escrow::{EscrowError, PaymentConfirmation};
use crate::AppState;

/// Event name the gateway sends when a charge settles
const CHARGE_SUCCESS: &str = "charge.success";

/// Webhook delivery body
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub reference: String,
}

/// Acknowledgement body returned to the gateway
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub message: String,
}

/// Apply a pay-confirmation event
///
/// POST /payments/webhook
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<WebhookEvent>,
) -> Result<Json<WebhookAck>, (StatusCode, Json<ErrorResponse>)> {
    let provided = headers
        .get("x-webhook-secret")
        .and_then(|value| value.to_str().ok());
    if !state.payments.verify_webhook(provided) {
        warn!("Webhook delivery with bad secret rejected");
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid webhook secret".to_string(),
            }),
        ));
    }

    if event.event != CHARGE_SUCCESS {
        // Other event families are delivered too; they carry nothing for
        // the escrow flow
        info!(event = %event.event, "Ignoring non-settlement webhook event");
        return Ok(Json(WebhookAck {
            message: "ignored".to_string(),
        }));
    }

    let outcome = state
        .escrow
        .confirm_payment(&state.db, &event.data.reference)
        .await
        .map_err(|err| match err {
            EscrowError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: format!("Unknown transaction reference {}", event.data.reference),
                }),
            ),
            other => {
                tracing::error!(error = %other, "Webhook processing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse {
                        error: other.to_string(),
                    }),
                )
            }
        })?;

    let message = match outcome {
        PaymentConfirmation::Applied => "applied",
        PaymentConfirmation::AlreadyPaid => "already_paid",
        PaymentConfirmation::RecordedOfferClosed(_) => "recorded_offer_closed",
    };
    info!(reference = %event.data.reference, message, "Webhook processed");
    Ok(Json(WebhookAck {
        message: message.to_string(),
    }))
}
