use axum::{
    routing::{delete, get, post},
    Router,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agromart_backend::jobs::abandonment_sweep::start_abandonment_sweep_job;
use agromart_backend::services::escrow::EscrowService;
use agromart_backend::services::escrow_stats::EscrowStatsService;
use agromart_backend::services::payments::PaymentGatewayService;
use agromart_backend::{handlers, AppState};

/// Accept refuses pending offers older than this (days)
const DEFAULT_PENDING_TTL_DAYS: i64 = 7;

/// Unpaid in_escrow offers are abandoned after this window (hours)
const DEFAULT_ABANDON_AFTER_HOURS: i64 = 72;

/// Abandonment sweep cadence (seconds)
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 600;

/// Platform fee in basis points of the offer amount
const DEFAULT_FEE_BPS: u32 = 150;

/// Admin stats cache TTL (seconds)
const STATS_CACHE_TTL_SECS: u64 = 60;

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agromart_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    let admin_api_key = env::var("ADMIN_API_KEY").unwrap_or_default();
    if admin_api_key.is_empty() {
        tracing::warn!("ADMIN_API_KEY not set, admin endpoints are locked");
    }

    let gateway_url = env::var("PAYMENT_GATEWAY_URL")
        .unwrap_or_else(|_| "https://pay.agromart.example.com".to_string());
    let gateway_secret = env::var("PAYMENT_GATEWAY_SECRET").ok();
    if gateway_secret.is_none() {
        tracing::warn!("PAYMENT_GATEWAY_SECRET not set, deriving checkout links locally");
    }
    let webhook_secret = env::var("PAYMENT_WEBHOOK_SECRET").ok();
    let fee_bps = env_parse("ESCROW_FEE_BPS", DEFAULT_FEE_BPS);

    let pending_ttl_days = env_parse("OFFER_PENDING_TTL_DAYS", DEFAULT_PENDING_TTL_DAYS);
    let abandon_after_hours = env_parse("ESCROW_ABANDON_AFTER_HOURS", DEFAULT_ABANDON_AFTER_HOURS);
    let sweep_interval_secs = env_parse("ESCROW_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS);

    let escrow = EscrowService::new(pending_ttl_days);
    let payments = PaymentGatewayService::new(gateway_secret, gateway_url, webhook_secret, fee_bps);
    let stats = EscrowStatsService::new(STATS_CACHE_TTL_SECS);

    // Abandon unpaid escrows in the background
    start_abandonment_sweep_job(
        db.clone(),
        escrow.clone(),
        abandon_after_hours,
        sweep_interval_secs,
    )
    .await;

    let state = AppState {
        db,
        escrow,
        payments,
        stats,
        admin_api_key,
    };

    // Build router
    let app = Router::new()
        .route("/", get(health))
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
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    // Start server
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind server address");

    tracing::info!("Server listening on {}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.unwrap();
}

async fn health() -> &'static str {
    "Agromart escrow backend"
}
