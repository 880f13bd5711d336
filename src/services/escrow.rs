//! Escrow offer engine
//!
//! Owns every status transition an offer can make. All mutations go
//! through a conditional UPDATE on the expected current status
//! (check-and-set): zero rows affected means another request won the
//! race and the caller sees `InvalidTransition` instead of a silent
//! double-apply. Opening a payment transaction and moving the offer into
//! `in_escrow` commit in one database transaction or not at all.

use chrono::{Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::str::FromStr;
use uuid::Uuid;

use crate::entities::{offers, prelude::*, transactions};
use crate::models::escrow::{
    next_status, role_permits, EscrowStatus, OfferAction, OfferRole, ResolveOutcome,
};
use crate::models::offer::{last_page, GetOffersResponse, OfferResponse, PER_PAGE};
use crate::services::payments::PaymentGatewayService;

/// Transaction status strings stored alongside `is_paid`
const TX_STATUS_OPEN: &str = "open";
const TX_STATUS_PAID: &str = "paid";

/// Error type for escrow operations
#[derive(Debug)]
pub enum EscrowError {
    /// The caller's side of the offer does not permit the action ("wrong
    /// person"). Never mutates state.
    Forbidden,
    /// The action is role-permitted but the offer is not in a state where
    /// it applies ("wrong time"), including terminal-state mutation
    /// attempts and lost check-and-set races.
    InvalidTransition {
        from: EscrowStatus,
        action: OfferAction,
    },
    /// Offer or transaction does not exist, or is not visible to the caller
    NotFound,
    /// A transaction has already been opened for this offer
    AlreadyOpen,
    /// Payment gateway unreachable or misbehaving; offer state unchanged,
    /// safe to retry
    Upstream(String),
    /// Database failure
    Database(DbErr),
}

impl std::fmt::Display for EscrowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowError::Forbidden => write!(f, "Action not permitted for this party"),
            EscrowError::InvalidTransition { from, action } => {
                write!(f, "Cannot {} an offer in status {}", action, from)
            }
            EscrowError::NotFound => write!(f, "Offer not found"),
            EscrowError::AlreadyOpen => write!(f, "Transaction already open for this offer"),
            EscrowError::Upstream(msg) => write!(f, "Payment gateway error: {}", msg),
            EscrowError::Database(err) => write!(f, "Database error: {}", err),
        }
    }
}

impl std::error::Error for EscrowError {}

impl From<DbErr> for EscrowError {
    fn from(err: DbErr) -> Self {
        EscrowError::Database(err)
    }
}

/// Outcome of a pay-confirmation event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentConfirmation {
    /// Funds recorded and the offer advanced to `success`
    Applied,
    /// The transaction was already paid; nothing changed
    AlreadyPaid,
    /// Funds recorded, but the offer had already left `in_escrow`
    /// (dispute or abandonment won the race); adjudication owns the
    /// outcome from here
    RecordedOfferClosed(EscrowStatus),
}

/// Escrow offer engine
#[derive(Clone)]
pub struct EscrowService {
    /// Accept refuses pending offers older than this
    pending_ttl: Duration,
}

impl EscrowService {
    pub fn new(pending_ttl_days: i64) -> Self {
        Self {
            pending_ttl: Duration::days(pending_ttl_days),
        }
    }

    /// List offers visible to `caller` (those where they are buyer or
    /// seller), newest first, with the fixed paging envelope. A page past
    /// the end returns an empty data set, not an error.
    pub async fn list_offers(
        &self,
        db: &DatabaseConnection,
        caller: i32,
        page: u64,
        status: Option<EscrowStatus>,
    ) -> Result<GetOffersResponse, EscrowError> {
        let mut select = Offers::find().filter(
            Condition::any()
                .add(offers::Column::BuyerId.eq(caller))
                .add(offers::Column::SellerId.eq(caller)),
        );
        if let Some(status) = status {
            select = select.filter(offers::Column::Status.eq(status.to_string()));
        }

        let total = select.clone().count(db).await?;

        let rows = select
            .order_by_desc(offers::Column::CreatedAt)
            .offset(page.saturating_sub(1) * PER_PAGE)
            .limit(PER_PAGE)
            .all(db)
            .await?;

        let mut data = Vec::with_capacity(rows.len());
        for offer in rows {
            let role = viewer_role(&offer, caller)?;
            data.push(self.render(db, offer, role).await?);
        }

        Ok(GetOffersResponse {
            current_page: page,
            data,
            last_page: last_page(total, PER_PAGE),
            total,
        })
    }

    /// Fetch a single offer as seen by `caller`
    pub async fn get_offer(
        &self,
        db: &DatabaseConnection,
        offer_id: i32,
        caller: i32,
    ) -> Result<OfferResponse, EscrowError> {
        let offer = self.load_offer(db, offer_id).await?;
        let role = viewer_role(&offer, caller)?;
        self.render(db, offer, role).await
    }

    /// Buyer proposes a price on a product; the offer starts `pending`.
    pub async fn create_offer(
        &self,
        db: &DatabaseConnection,
        buyer_id: i32,
        product_id: i32,
        amount: rust_decimal::Decimal,
        description: Option<String>,
    ) -> Result<OfferResponse, EscrowError> {
        let product = Products::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or(EscrowError::NotFound)?;

        // An offer always has exactly one buyer and one seller, and they
        // are never the same account
        if product.seller_id == buyer_id {
            return Err(EscrowError::Forbidden);
        }

        let now = Utc::now().fixed_offset();
        let offer = offers::ActiveModel {
            product_id: Set(product.id),
            buyer_id: Set(buyer_id),
            seller_id: Set(product.seller_id),
            amount: Set(amount),
            description: Set(description),
            status: Set(EscrowStatus::Pending.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(
            offer_id = offer.id,
            buyer_id,
            seller_id = product.seller_id,
            "Escrow offer created"
        );

        self.render_core(db, offer, product, None, OfferRole::Buyer)
            .await
    }

    /// Seller accepts a pending offer, then the system opens the payment
    /// transaction and moves it into escrow.
    ///
    /// Idempotent: re-accepting an offer that is already `accepted` or
    /// `in_escrow` returns the current state without error or a duplicate
    /// transaction (and retries the payment opening if an earlier gateway
    /// call failed).
    pub async fn accept(
        &self,
        db: &DatabaseConnection,
        payments: &PaymentGatewayService,
        offer_id: i32,
        caller: i32,
    ) -> Result<OfferResponse, EscrowError> {
        let offer = self.load_offer(db, offer_id).await?;
        let role = viewer_role(&offer, caller)?;
        if !role_permits(role, OfferAction::Accept) {
            return Err(EscrowError::Forbidden);
        }

        let status = parse_status(&offer.status);
        match status {
            // Idempotent re-accept: the payment is already open
            EscrowStatus::InEscrow => return self.render(db, offer, role).await,
            // Accepted but no transaction yet means an earlier gateway
            // call failed; retry the opening
            EscrowStatus::Accepted => {
                let mut offer = offer;
                let tx = self.open_transaction(db, payments, &offer).await?;
                offer.status = EscrowStatus::InEscrow.to_string();
                return self.render_with(db, offer, Some(tx), role).await;
            }
            EscrowStatus::Pending => {}
            from => {
                return Err(EscrowError::InvalidTransition {
                    from,
                    action: OfferAction::Accept,
                })
            }
        }

        // Stale pending offers can no longer be taken
        if Utc::now().fixed_offset() - offer.created_at > self.pending_ttl {
            tracing::info!(offer_id, "Accept refused: pending offer expired");
            return Err(EscrowError::InvalidTransition {
                from: EscrowStatus::Pending,
                action: OfferAction::Accept,
            });
        }

        if !cas(db, offer_id, EscrowStatus::Pending, EscrowStatus::Accepted).await? {
            return Err(EscrowError::InvalidTransition {
                from: EscrowStatus::Pending,
                action: OfferAction::Accept,
            });
        }

        let mut offer = offer;
        offer.status = EscrowStatus::Accepted.to_string();
        tracing::info!(offer_id, "Offer accepted, opening payment");

        let tx = self.open_transaction(db, payments, &offer).await?;
        offer.status = EscrowStatus::InEscrow.to_string();
        self.render_with(db, offer, Some(tx), role).await
    }

    /// Seller declines a pending offer
    pub async fn reject(
        &self,
        db: &DatabaseConnection,
        offer_id: i32,
        caller: i32,
    ) -> Result<OfferResponse, EscrowError> {
        self.party_transition(db, offer_id, caller, OfferAction::Reject)
            .await
    }

    /// Either party withdraws a pending offer
    pub async fn cancel(
        &self,
        db: &DatabaseConnection,
        offer_id: i32,
        caller: i32,
    ) -> Result<OfferResponse, EscrowError> {
        self.party_transition(db, offer_id, caller, OfferAction::Cancel)
            .await
    }

    /// Either party escalates an in-escrow offer to dispute
    pub async fn dispute(
        &self,
        db: &DatabaseConnection,
        offer_id: i32,
        caller: i32,
    ) -> Result<OfferResponse, EscrowError> {
        self.party_transition(db, offer_id, caller, OfferAction::Dispute)
            .await
    }

    /// Admin adjudicates a disputed offer to `success` or `failed`
    pub async fn resolve(
        &self,
        db: &DatabaseConnection,
        offer_id: i32,
        outcome: ResolveOutcome,
    ) -> Result<EscrowStatus, EscrowError> {
        let offer = self.load_offer(db, offer_id).await?;
        let from = parse_status(&offer.status);
        let action = OfferAction::Resolve(outcome);
        let Some(to) = next_status(from, action) else {
            return Err(EscrowError::InvalidTransition { from, action });
        };
        if !cas(db, offer_id, from, to).await? {
            return Err(EscrowError::InvalidTransition { from, action });
        }
        tracing::info!(offer_id, outcome = %to, "Dispute resolved");
        Ok(to)
    }

    /// Open the payment transaction for an accepted offer: obtain a
    /// checkout link from the gateway, then insert the transaction and
    /// advance the offer to `in_escrow` atomically. If the gateway call
    /// fails the offer stays `accepted` and the error is retryable.
    pub async fn open_transaction(
        &self,
        db: &DatabaseConnection,
        payments: &PaymentGatewayService,
        offer: &offers::Model,
    ) -> Result<transactions::Model, EscrowError> {
        let existing = Transactions::find()
            .filter(transactions::Column::OfferId.eq(offer.id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(EscrowError::AlreadyOpen);
        }

        let reference = format!("esc_{}", Uuid::new_v4().simple());
        let charge = payments.charge_for(offer.amount);
        let payment_link = payments
            .create_checkout(&reference, offer.amount)
            .await
            .map_err(|e| EscrowError::Upstream(e.to_string()))?;

        let now = Utc::now().fixed_offset();
        let txn = db.begin().await?;

        let tx = transactions::ActiveModel {
            offer_id: Set(offer.id),
            reference: Set(reference),
            amount: Set(offer.amount),
            charge: Set(charge),
            status: Set(TX_STATUS_OPEN.to_string()),
            is_paid: Set(false),
            payment_link: Set(payment_link),
            paid_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if !cas(&txn, offer.id, EscrowStatus::Accepted, EscrowStatus::InEscrow).await? {
            txn.rollback().await?;
            return Err(EscrowError::InvalidTransition {
                from: parse_status(&offer.status),
                action: OfferAction::OpenPayment,
            });
        }

        txn.commit().await?;
        tracing::info!(
            offer_id = offer.id,
            transaction_id = tx.id,
            "Transaction opened, offer in escrow"
        );
        Ok(tx)
    }

    /// Apply a pay-confirmation from the gateway, keyed by the gateway
    /// reference. Idempotent: a duplicate event for an already-paid
    /// transaction is a no-op success.
    pub async fn confirm_payment(
        &self,
        db: &DatabaseConnection,
        reference: &str,
    ) -> Result<PaymentConfirmation, EscrowError> {
        let tx = Transactions::find()
            .filter(transactions::Column::Reference.eq(reference))
            .one(db)
            .await?
            .ok_or(EscrowError::NotFound)?;

        if tx.is_paid {
            return Ok(PaymentConfirmation::AlreadyPaid);
        }

        let now = Utc::now().fixed_offset();
        let txn = db.begin().await?;

        // Guard on is_paid so two concurrent confirmations apply funds once
        let updated = Transactions::update_many()
            .col_expr(transactions::Column::IsPaid, Expr::value(true))
            .col_expr(transactions::Column::Status, Expr::value(TX_STATUS_PAID))
            .col_expr(transactions::Column::PaidAt, Expr::value(Some(now)))
            .col_expr(transactions::Column::UpdatedAt, Expr::value(now))
            .filter(transactions::Column::Id.eq(tx.id))
            .filter(transactions::Column::IsPaid.eq(false))
            .exec(&txn)
            .await?;
        if updated.rows_affected == 0 {
            txn.commit().await?;
            return Ok(PaymentConfirmation::AlreadyPaid);
        }

        let advanced = cas(&txn, tx.offer_id, EscrowStatus::InEscrow, EscrowStatus::Success).await?;
        if advanced {
            txn.commit().await?;
            tracing::info!(offer_id = tx.offer_id, reference, "Payment confirmed, offer succeeded");
            return Ok(PaymentConfirmation::Applied);
        }

        // The offer left escrow first (dispute or abandonment). The funds
        // were still captured, so the payment is recorded either way.
        let offer = Offers::find_by_id(tx.offer_id)
            .one(&txn)
            .await?
            .ok_or(EscrowError::NotFound)?;
        txn.commit().await?;
        let status = parse_status(&offer.status);
        tracing::warn!(
            offer_id = tx.offer_id,
            reference,
            status = %status,
            "Payment recorded but offer already left escrow"
        );
        Ok(PaymentConfirmation::RecordedOfferClosed(status))
    }

    /// Transition every `in_escrow` offer untouched since `cutoff` to
    /// `abandoned`. Idempotent and race-safe: the conditional update only
    /// moves rows still in escrow, so a concurrent payment confirmation
    /// simply wins or loses the usual way.
    pub async fn abandon_stale(
        &self,
        db: &DatabaseConnection,
        cutoff: chrono::DateTime<chrono::FixedOffset>,
    ) -> Result<u64, EscrowError> {
        let result = Offers::update_many()
            .col_expr(
                offers::Column::Status,
                Expr::value(EscrowStatus::Abandoned.to_string()),
            )
            .col_expr(
                offers::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(offers::Column::Status.eq(EscrowStatus::InEscrow.to_string()))
            .filter(offers::Column::UpdatedAt.lt(cutoff))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Shared path for reject/cancel/dispute: role gate, transition table,
    /// then one check-and-set.
    async fn party_transition(
        &self,
        db: &DatabaseConnection,
        offer_id: i32,
        caller: i32,
        action: OfferAction,
    ) -> Result<OfferResponse, EscrowError> {
        let offer = self.load_offer(db, offer_id).await?;
        let role = viewer_role(&offer, caller)?;
        if !role_permits(role, action) {
            return Err(EscrowError::Forbidden);
        }

        let from = parse_status(&offer.status);
        let Some(to) = next_status(from, action) else {
            return Err(EscrowError::InvalidTransition { from, action });
        };
        if !cas(db, offer_id, from, to).await? {
            return Err(EscrowError::InvalidTransition { from, action });
        }

        tracing::info!(offer_id, %action, from = %from, to = %to, "Offer transitioned");
        let mut offer = offer;
        offer.status = to.to_string();
        self.render(db, offer, role).await
    }

    async fn load_offer(
        &self,
        db: &DatabaseConnection,
        offer_id: i32,
    ) -> Result<offers::Model, EscrowError> {
        Offers::find_by_id(offer_id)
            .one(db)
            .await?
            .ok_or(EscrowError::NotFound)
    }

    /// Render an offer for a viewer, fetching the transaction first
    async fn render(
        &self,
        db: &DatabaseConnection,
        offer: offers::Model,
        role: OfferRole,
    ) -> Result<OfferResponse, EscrowError> {
        let tx = Transactions::find()
            .filter(transactions::Column::OfferId.eq(offer.id))
            .one(db)
            .await?;
        self.render_with(db, offer, tx, role).await
    }

    /// Render an offer for a viewer with an already-known transaction
    async fn render_with(
        &self,
        db: &DatabaseConnection,
        offer: offers::Model,
        tx: Option<transactions::Model>,
        role: OfferRole,
    ) -> Result<OfferResponse, EscrowError> {
        let product = Products::find_by_id(offer.product_id)
            .one(db)
            .await?
            .ok_or(EscrowError::NotFound)?;
        self.render_core(db, offer, product, tx, role).await
    }

    async fn render_core(
        &self,
        db: &DatabaseConnection,
        offer: offers::Model,
        product: crate::entities::products::Model,
        tx: Option<transactions::Model>,
        role: OfferRole,
    ) -> Result<OfferResponse, EscrowError> {
        let buyer = Users::find_by_id(offer.buyer_id)
            .one(db)
            .await?
            .ok_or(EscrowError::NotFound)?;
        let seller = Users::find_by_id(offer.seller_id)
            .one(db)
            .await?
            .ok_or(EscrowError::NotFound)?;
        Ok(OfferResponse::from_parts(offer, product, buyer, seller, tx, role))
    }
}

/// Derive which side of the offer the caller is on. A caller on neither
/// side cannot see the offer at all.
fn viewer_role(offer: &offers::Model, caller: i32) -> Result<OfferRole, EscrowError> {
    if offer.buyer_id == caller {
        Ok(OfferRole::Buyer)
    } else if offer.seller_id == caller {
        Ok(OfferRole::Seller)
    } else {
        Err(EscrowError::NotFound)
    }
}

fn parse_status(raw: &str) -> EscrowStatus {
    // The column only ever holds strings this code wrote
    EscrowStatus::from_str(raw).unwrap_or(EscrowStatus::Pending)
}

/// Atomic check-and-set on the offer status. Returns false when the row
/// was not in `from` anymore, i.e. a concurrent transition won.
async fn cas<C: ConnectionTrait>(
    conn: &C,
    offer_id: i32,
    from: EscrowStatus,
    to: EscrowStatus,
) -> Result<bool, DbErr> {
    let result = Offers::update_many()
        .col_expr(offers::Column::Status, Expr::value(to.to_string()))
        .col_expr(
            offers::Column::UpdatedAt,
            Expr::value(Utc::now().fixed_offset()),
        )
        .filter(offers::Column::Id.eq(offer_id))
        .filter(offers::Column::Status.eq(from.to_string()))
        .exec(conn)
        .await?;
    Ok(result.rows_affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{products, users};
    use chrono::DateTime;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    const BUYER: i32 = 1;
    const SELLER: i32 = 2;

    fn service() -> EscrowService {
        EscrowService::new(7)
    }

    fn payments() -> PaymentGatewayService {
        // Dev mode: checkout links derived locally, no network
        PaymentGatewayService::new(None, "https://pay.agromart.test".to_string(), None, 150)
    }

    fn offer(status: &str) -> offers::Model {
        offers::Model {
            id: 7,
            product_id: 3,
            buyer_id: BUYER,
            seller_id: SELLER,
            amount: dec!(5000),
            description: None,
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
            description: None,
            price: dec!(5500),
            images: serde_json::json!([]),
            created_at: DateTime::parse_from_rfc3339("2026-06-20T00:00:00Z").unwrap(),
        }
    }

    fn user(id: i32) -> users::Model {
        users::Model {
            id,
            first_name: format!("user{}", id),
            last_name: None,
            email: format!("user{}@example.com", id),
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

    #[tokio::test]
    async fn test_accept_by_buyer_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![offer("pending")]])
            .into_connection();

        let err = service().accept(&db, &payments(), 7, BUYER).await.unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden));
    }

    #[tokio::test]
    async fn test_accept_on_terminal_offer_is_invalid_transition() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![offer("cancelled")]])
            .into_connection();

        let err = service().accept(&db, &payments(), 7, SELLER).await.unwrap_err();
        assert!(matches!(
            err,
            EscrowError::InvalidTransition {
                from: EscrowStatus::Cancelled,
                action: OfferAction::Accept,
            }
        ));
    }

    #[tokio::test]
    async fn test_accept_refuses_expired_pending_offer() {
        let mut stale = offer("pending");
        stale.created_at = (Utc::now() - Duration::days(30)).fixed_offset();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stale]])
            .into_connection();

        let err = service().accept(&db, &payments(), 7, SELLER).await.unwrap_err();
        assert!(matches!(err, EscrowError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_accept_lost_race_is_invalid_transition() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![offer("pending")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let err = service().accept(&db, &payments(), 7, SELLER).await.unwrap_err();
        assert!(matches!(err, EscrowError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_accept_opens_transaction_and_enters_escrow() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // load offer, duplicate-transaction check, insert returning,
            // then product/buyer/seller for rendering
            .append_query_results([vec![offer("pending")]])
            .append_query_results([Vec::<transactions::Model>::new()])
            .append_query_results([vec![transaction(false)]])
            .append_query_results([vec![product()]])
            .append_query_results([vec![user(BUYER)]])
            .append_query_results([vec![user(SELLER)]])
            // pending→accepted, then accepted→in_escrow inside the txn
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

        let response = service().accept(&db, &payments(), 7, SELLER).await.unwrap();
        assert_eq!(response.status, EscrowStatus::InEscrow);
        assert_eq!(response.user_type, OfferRole::Seller);
        assert!(!response.payment_link.is_empty());
        let tx = response.transaction.expect("transaction should be open");
        assert!(!tx.is_paid);
        assert_eq!(tx.amount, 5000.0);
    }

    #[tokio::test]
    async fn test_reaccept_in_escrow_is_a_noop() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![offer("in_escrow")]])
            .append_query_results([vec![transaction(false)]])
            .append_query_results([vec![product()]])
            .append_query_results([vec![user(BUYER)]])
            .append_query_results([vec![user(SELLER)]])
            .into_connection();

        let response = service().accept(&db, &payments(), 7, SELLER).await.unwrap();
        assert_eq!(response.status, EscrowStatus::InEscrow);
        assert!(response.transaction.is_some());
        // No exec results were scripted: a second transaction or status
        // write would have panicked the mock
    }

    #[tokio::test]
    async fn test_open_transaction_rejects_duplicates() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![transaction(false)]])
            .into_connection();

        let err = service()
            .open_transaction(&db, &payments(), &offer("accepted"))
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::AlreadyOpen));
    }

    #[tokio::test]
    async fn test_cancel_in_escrow_is_invalid_transition() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![offer("in_escrow")]])
            .into_connection();

        let err = service().cancel(&db, 7, BUYER).await.unwrap_err();
        assert!(matches!(
            err,
            EscrowError::InvalidTransition {
                from: EscrowStatus::InEscrow,
                action: OfferAction::Cancel,
            }
        ));
    }

    #[tokio::test]
    async fn test_offer_hidden_from_third_parties() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![offer("pending")]])
            .into_connection();

        let err = service().get_offer(&db, 7, 99).await.unwrap_err();
        assert!(matches!(err, EscrowError::NotFound));
    }

    #[tokio::test]
    async fn test_confirm_payment_is_idempotent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![transaction(true)]])
            .into_connection();

        let outcome = service().confirm_payment(&db, "esc_ref").await.unwrap();
        assert_eq!(outcome, PaymentConfirmation::AlreadyPaid);
    }

    #[tokio::test]
    async fn test_confirm_payment_advances_offer() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![transaction(false)]])
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

        let outcome = service().confirm_payment(&db, "esc_ref").await.unwrap();
        assert_eq!(outcome, PaymentConfirmation::Applied);
    }

    #[tokio::test]
    async fn test_confirm_payment_records_even_when_offer_closed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![transaction(false)]])
            .append_query_results([vec![offer("abandoned")]])
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();

        let outcome = service().confirm_payment(&db, "esc_ref").await.unwrap();
        assert_eq!(
            outcome,
            PaymentConfirmation::RecordedOfferClosed(EscrowStatus::Abandoned)
        );
    }

    #[tokio::test]
    async fn test_resolve_requires_disputed_state() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![offer("in_escrow")]])
            .into_connection();

        let err = service()
            .resolve(&db, 7, ResolveOutcome::Failed)
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_resolve_disputed_offer() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![offer("disputed")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let status = service()
            .resolve(&db, 7, ResolveOutcome::Success)
            .await
            .unwrap();
        assert_eq!(status, EscrowStatus::Success);
    }

    #[tokio::test]
    async fn test_abandon_stale_reports_swept_rows() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 3,
            }])
            .into_connection();

        let cutoff = (Utc::now() - Duration::hours(72)).fixed_offset();
        let swept = service().abandon_stale(&db, cutoff).await.unwrap();
        assert_eq!(swept, 3);
    }

    #[tokio::test]
    async fn test_create_offer_on_own_product_is_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![product()]])
            .into_connection();

        let err = service()
            .create_offer(&db, SELLER, 3, dec!(4500), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EscrowError::Forbidden));
    }
}
