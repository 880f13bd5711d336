//! Router-level tests for the offer API
//!
//! Each test drives the real router with a scripted mock database, so the
//! suite asserts the wire contract (status codes, paging envelope, error
//! distinctions) without needing Postgres.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal_macros::dec;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
use serde_json::Value;
use std::collections::BTreeMap;
use tower::ServiceExt;

use agromart_backend::entities::{offers, products, transactions, users};
use agromart_backend::services::escrow::EscrowService;
use agromart_backend::services::escrow_stats::EscrowStatsService;
use agromart_backend::services::payments::PaymentGatewayService;
use agromart_backend::{handlers, AppState};

const BUYER: i32 = 1;
const SELLER: i32 = 2;

fn test_state(db: DatabaseConnection) -> AppState {
    AppState {
        db,
        escrow: EscrowService::new(7),
        payments: PaymentGatewayService::new(
            None,
            "https://pay.agromart.test".to_string(),
            None,
            150,
        ),
        stats: EscrowStatsService::new(60),
        admin_api_key: "test-admin-key".to_string(),
    }
}

fn build_router(db: DatabaseConnection) -> Router {
    Router::new()
        .route(
            "/offers",
            get(handlers::offer::list_offers).post(handlers::offer::create_offer),
        )
        .route("/offers/{id}", get(handlers::offer::get_offer))
        .route("/offers/accept/{id}", get(handlers::offer::accept_offer))
        .route("/offers/reject/{id}", delete(handlers::offer::reject_offer))
        .route("/offers/cancel/{id}", post(handlers::offer::cancel_offer))
        .route("/offers/dispute/{id}", post(handlers::offer::dispute_offer))
        .route("/payments/webhook", post(handlers::payment::payment_webhook))
        .route("/admin/escrow/stats", get(handlers::admin::escrow_stats))
        .route(
            "/admin/offers/{id}/resolve",
            post(handlers::admin::resolve_offer),
        )
        .with_state(test_state(db))
}

fn offer(status: &str) -> offers::Model {
    offers::Model {
        id: 7,
        product_id: 3,
        buyer_id: BUYER,
        seller_id: SELLER,
        amount: dec!(5000),
        description: Some("Two crates, delivered Friday".to_string()),
        status: status.to_string(),
        created_at: (Utc::now() - Duration::minutes(10)).fixed_offset(),
        updated_at: (Utc::now() - Duration::minutes(10)).fixed_offset(),
    }
}

fn product() -> products::Model {
    products::Model {
        id: 3,
        seller_id: SELLER,
        title: "Maize (50kg bags)".to_string(),
        description: Some("Dry maize, this season's harvest".to_string()),
        price: dec!(5500),
        images: serde_json::json!(["https://cdn.agromart.test/maize.jpg"]),
        created_at: DateTime::parse_from_rfc3339("2026-06-20T00:00:00Z").unwrap(),
    }
}

fn user(id: i32, first_name: &str) -> users::Model {
    users::Model {
        id,
        first_name: first_name.to_string(),
        last_name: None,
        email: format!("{}@agromart.test", first_name),
        phone: None,
        avatar: None,
        created_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap(),
    }
}

fn transaction(is_paid: bool) -> transactions::Model {
    transactions::Model {
        id: 11,
        offer_id: 7,
        reference: "esc_ref".to_string(),
        amount: dec!(5000),
        charge: dec!(75),
        status: if is_paid { "paid" } else { "open" }.to_string(),
        is_paid,
        payment_link: "https://pay.agromart.test/pay/esc_ref".to_string(),
        paid_at: None,
        created_at: DateTime::parse_from_rfc3339("2026-07-01T10:00:00Z").unwrap(),
        updated_at: DateTime::parse_from_rfc3339("2026-07-01T10:00:00Z").unwrap(),
    }
}

/// Row shape SeaORM expects back from a COUNT(*) subquery
fn count_row(total: i64) -> BTreeMap<&'static str, sea_orm::Value> {
    let mut row = BTreeMap::new();
    row.insert("num_items", sea_orm::Value::BigInt(Some(total)));
    row
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_list_offers_requires_identity() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(Request::builder().uri("/offers").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_offers_rejects_unknown_status() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/offers?status=shipped")
                .header("x-user-id", BUYER.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_page_beyond_last_returns_empty_data() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![count_row(0)]])
        .append_query_results([Vec::<offers::Model>::new()])
        .into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/offers?page=3")
                .header("x-user-id", BUYER.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["current_page"], 3);
    assert_eq!(json["last_page"], 1);
    assert_eq!(json["total"], 0);
    assert_eq!(json["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_accept_by_buyer_is_forbidden() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![offer("pending")]])
        .into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/offers/accept/7")
                .header("x-user-id", BUYER.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reject_after_settlement_is_conflict() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![offer("success")]])
        .into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/offers/reject/7")
                .header("x-user-id", SELLER.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_cancel_in_escrow_is_conflict() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![offer("in_escrow")]])
        .into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/offers/cancel/7")
                .header("x-user-id", BUYER.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_missing_offer_is_not_found() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<offers::Model>::new()])
        .into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/offers/999")
                .header("x-user-id", BUYER.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_accept_moves_offer_into_escrow() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        // load, duplicate-transaction check, insert returning, then
        // product/buyer/seller for the response
        .append_query_results([vec![offer("pending")]])
        .append_query_results([Vec::<transactions::Model>::new()])
        .append_query_results([vec![transaction(false)]])
        .append_query_results([vec![product()]])
        .append_query_results([vec![user(BUYER, "Bola")]])
        .append_query_results([vec![user(SELLER, "Sade")]])
        .append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
        ])
        .into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/offers/accept/7")
                .header("x-user-id", SELLER.to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "in_escrow");
    assert_eq!(json["user_type"], "seller");
    assert_eq!(json["amount"], 5000.0);
    assert!(!json["payment_link"].as_str().unwrap().is_empty());
    assert_eq!(json["transaction"]["is_paid"], false);
    assert_eq!(json["buyer"]["first_name"], "Bola");
    assert_eq!(json["seller"]["first_name"], "Sade");
}

#[tokio::test]
async fn test_webhook_duplicate_delivery_is_acknowledged() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![transaction(true)]])
        .into_connection();
    let app = build_router(db);

    let body = serde_json::json!({
        "event": "charge.success",
        "data": { "reference": "esc_ref" }
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "already_paid");
}

#[tokio::test]
async fn test_webhook_ignores_unrelated_events() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let app = build_router(db);

    let body = serde_json::json!({
        "event": "transfer.success",
        "data": { "reference": "esc_ref" }
    });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/payments/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "ignored");
}

#[tokio::test]
async fn test_admin_endpoints_require_api_key() {
    let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/escrow/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_resolves_disputed_offer() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![offer("disputed")]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let app = build_router(db);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/offers/7/resolve")
                .header("x-api-key", "test-admin-key")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"outcome":"failed"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], 7);
    assert_eq!(json["status"], "failed");
}
