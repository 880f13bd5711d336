//! Offer wire models for the /offers endpoints
//!
//! The paging envelope ({ current_page, data, last_page, total }) and the
//! nested offer shape are a stable contract with the storefront and admin
//! dashboards; field names here must not drift.

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::entities::{offers, products, transactions, users};
use crate::models::escrow::{EscrowStatus, OfferRole};

/// Offers per page. The envelope assumes a fixed page contract, so this is
/// not client-tunable.
pub const PER_PAGE: u64 = 15;

/// Generic error body returned by every handler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Query parameters for GET /offers
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OffersQuery {
    /// 1-based page number (default: 1)
    pub page: Option<u64>,
    /// Optional single status filter
    pub status: Option<String>,
}

impl OffersQuery {
    /// Validate the query, returning the parsed status filter.
    /// An unknown status string is a client error, not an empty result.
    pub fn validate(&self) -> Result<Option<EscrowStatus>, String> {
        if let Some(page) = self.page {
            if page < 1 {
                return Err("page must be at least 1".to_string());
            }
        }
        match &self.status {
            None => Ok(None),
            Some(raw) => EscrowStatus::from_str(raw).map(Some),
        }
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Body for POST /offers
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOfferRequest {
    pub product_id: i32,
    /// Proposed price; must be strictly positive
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Product snapshot nested in an offer (display only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferProduct {
    pub id: i32,
    pub title: String,
    pub price: f64,
    pub images: Vec<String>,
    pub description: String,
}

/// Party nested in an offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferUser {
    pub id: i32,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub avatar: String,
}

/// Payment transaction nested in an offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferTransaction {
    pub id: i32,
    pub amount: f64,
    pub status: String,
    pub is_paid: bool,
    pub charge: f64,
    pub payment_link: String,
}

/// A single escrow offer as seen by one of its parties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferResponse {
    pub id: i32,
    pub amount: f64,
    pub status: EscrowStatus,
    pub description: String,
    pub created_at: String,
    /// The viewer's side of the offer, derived server-side per request
    pub user_type: OfferRole,
    /// Empty until a transaction is opened
    pub payment_link: String,
    pub product: OfferProduct,
    pub seller: OfferUser,
    pub buyer: OfferUser,
    pub transaction: Option<OfferTransaction>,
}

/// Paging envelope for GET /offers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetOffersResponse {
    pub current_page: u64,
    pub data: Vec<OfferResponse>,
    pub last_page: u64,
    pub total: u64,
}

/// Last page for a total row count; an empty result set still has page 1
pub fn last_page(total: u64, per_page: u64) -> u64 {
    total.div_ceil(per_page).max(1)
}

impl From<users::Model> for OfferUser {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            first_name: model.first_name,
            last_name: model.last_name,
            email: model.email,
            phone: model.phone,
            avatar: model.avatar.unwrap_or_default(),
        }
    }
}

impl From<products::Model> for OfferProduct {
    fn from(model: products::Model) -> Self {
        let images: Vec<String> = serde_json::from_value(model.images).unwrap_or_default();
        Self {
            id: model.id,
            title: model.title,
            price: model.price.to_f64().unwrap_or(0.0),
            images,
            description: model.description.unwrap_or_default(),
        }
    }
}

impl From<transactions::Model> for OfferTransaction {
    fn from(model: transactions::Model) -> Self {
        Self {
            id: model.id,
            amount: model.amount.to_f64().unwrap_or(0.0),
            status: model.status,
            is_paid: model.is_paid,
            charge: model.charge.to_f64().unwrap_or(0.0),
            payment_link: model.payment_link,
        }
    }
}

impl OfferResponse {
    /// Assemble the wire shape from the stored rows, deriving the viewer's
    /// role from the offer itself rather than anything client-supplied.
    pub fn from_parts(
        offer: offers::Model,
        product: products::Model,
        buyer: users::Model,
        seller: users::Model,
        transaction: Option<transactions::Model>,
        viewer_role: OfferRole,
    ) -> Self {
        let status = EscrowStatus::from_str(&offer.status).unwrap_or(EscrowStatus::Pending);
        let transaction: Option<OfferTransaction> = transaction.map(Into::into);
        let payment_link = transaction
            .as_ref()
            .map(|t| t.payment_link.clone())
            .unwrap_or_default();

        Self {
            id: offer.id,
            amount: offer.amount.to_f64().unwrap_or(0.0),
            status,
            description: offer.description.unwrap_or_default(),
            created_at: offer.created_at.to_rfc3339(),
            user_type: viewer_role,
            payment_link,
            product: product.into(),
            seller: seller.into(),
            buyer: buyer.into(),
            transaction,
        }
    }
}
