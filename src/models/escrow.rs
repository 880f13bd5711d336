//! Escrow offer status, actions, and the transition table
//!
//! Status progresses: pending → accepted → in_escrow → success
//!                           ↘ rejected          ↘ disputed → success | failed
//!                           ↘ cancelled         ↘ abandoned
//!
//! `success`, `failed`, `rejected`, `cancelled`, and `abandoned` are
//! terminal. Transitions are a single explicit match over (state, action)
//! pairs; anything not listed there is invalid.

use serde::{Deserialize, Serialize};

/// Escrow offer status values, persisted as the wire strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// Offer created, awaiting the seller's decision
    Pending,
    /// Seller accepted, payment not yet opened
    Accepted,
    /// Transaction open, awaiting the buyer's payment
    InEscrow,
    /// Funds confirmed (or dispute resolved for the buyer's delivery)
    Success,
    /// Dispute resolved against the trade
    Failed,
    /// Seller declined the offer
    Rejected,
    /// Withdrawn by a party while still pending
    Cancelled,
    /// A party raised a dispute while funds were in flight
    Disputed,
    /// No payment arrived within the abandonment window
    Abandoned,
}

impl EscrowStatus {
    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Failed | Self::Rejected | Self::Cancelled | Self::Abandoned
        )
    }

    pub const ALL: [EscrowStatus; 9] = [
        Self::Pending,
        Self::Accepted,
        Self::InEscrow,
        Self::Success,
        Self::Failed,
        Self::Rejected,
        Self::Cancelled,
        Self::Disputed,
        Self::Abandoned,
    ];
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EscrowStatus::Pending => write!(f, "pending"),
            EscrowStatus::Accepted => write!(f, "accepted"),
            EscrowStatus::InEscrow => write!(f, "in_escrow"),
            EscrowStatus::Success => write!(f, "success"),
            EscrowStatus::Failed => write!(f, "failed"),
            EscrowStatus::Rejected => write!(f, "rejected"),
            EscrowStatus::Cancelled => write!(f, "cancelled"),
            EscrowStatus::Disputed => write!(f, "disputed"),
            EscrowStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl std::str::FromStr for EscrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EscrowStatus::Pending),
            "accepted" => Ok(EscrowStatus::Accepted),
            "in_escrow" => Ok(EscrowStatus::InEscrow),
            "success" => Ok(EscrowStatus::Success),
            "failed" => Ok(EscrowStatus::Failed),
            "rejected" => Ok(EscrowStatus::Rejected),
            "cancelled" => Ok(EscrowStatus::Cancelled),
            "disputed" => Ok(EscrowStatus::Disputed),
            "abandoned" => Ok(EscrowStatus::Abandoned),
            _ => Err(format!("Unknown escrow status: {}", s)),
        }
    }
}

/// Which side of the offer the authenticated caller is on, re-derived
/// from the stored buyer/seller ids on every request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferRole {
    Buyer,
    Seller,
}

impl std::fmt::Display for OfferRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferRole::Buyer => write!(f, "buyer"),
            OfferRole::Seller => write!(f, "seller"),
        }
    }
}

/// Outcome of an admin adjudication on a disputed offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveOutcome {
    Success,
    Failed,
}

impl From<ResolveOutcome> for EscrowStatus {
    fn from(outcome: ResolveOutcome) -> Self {
        match outcome {
            ResolveOutcome::Success => EscrowStatus::Success,
            ResolveOutcome::Failed => EscrowStatus::Failed,
        }
    }
}

/// Everything that can be asked of an offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    /// Seller takes the offer (pending → accepted)
    Accept,
    /// Seller declines the offer (pending → rejected)
    Reject,
    /// Either party withdraws while pending (pending → cancelled)
    Cancel,
    /// Either party escalates while funds are in flight (in_escrow → disputed)
    Dispute,
    /// System opens the payment transaction (accepted → in_escrow)
    OpenPayment,
    /// Gateway confirms funds (in_escrow → success)
    ConfirmPayment,
    /// Sweep gives up on an unpaid escrow (in_escrow → abandoned)
    Abandon,
    /// Admin adjudicates a dispute (disputed → success | failed)
    Resolve(ResolveOutcome),
}

impl std::fmt::Display for OfferAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OfferAction::Accept => write!(f, "accept"),
            OfferAction::Reject => write!(f, "reject"),
            OfferAction::Cancel => write!(f, "cancel"),
            OfferAction::Dispute => write!(f, "dispute"),
            OfferAction::OpenPayment => write!(f, "open_payment"),
            OfferAction::ConfirmPayment => write!(f, "confirm_payment"),
            OfferAction::Abandon => write!(f, "abandon"),
            OfferAction::Resolve(_) => write!(f, "resolve"),
        }
    }
}

/// Whether a party in `role` is allowed to request `action` at all,
/// independent of the offer's current state. A `false` here is a
/// `Forbidden` ("wrong person"); a state mismatch in [`next_status`]
/// is an `InvalidTransition` ("wrong time").
///
/// System and admin actions are never party-invokable.
pub fn role_permits(role: OfferRole, action: OfferAction) -> bool {
    match action {
        OfferAction::Accept | OfferAction::Reject => role == OfferRole::Seller,
        OfferAction::Cancel | OfferAction::Dispute => true,
        OfferAction::OpenPayment
        | OfferAction::ConfirmPayment
        | OfferAction::Abandon
        | OfferAction::Resolve(_) => false,
    }
}

/// The transition table. Returns the resulting status, or `None` when the
/// action does not apply in the current state (including every action
/// against a terminal state).
pub fn next_status(from: EscrowStatus, action: OfferAction) -> Option<EscrowStatus> {
    match (from, action) {
        (EscrowStatus::Pending, OfferAction::Accept) => Some(EscrowStatus::Accepted),
        (EscrowStatus::Pending, OfferAction::Reject) => Some(EscrowStatus::Rejected),
        (EscrowStatus::Pending, OfferAction::Cancel) => Some(EscrowStatus::Cancelled),
        (EscrowStatus::Accepted, OfferAction::OpenPayment) => Some(EscrowStatus::InEscrow),
        (EscrowStatus::InEscrow, OfferAction::ConfirmPayment) => Some(EscrowStatus::Success),
        (EscrowStatus::InEscrow, OfferAction::Dispute) => Some(EscrowStatus::Disputed),
        (EscrowStatus::InEscrow, OfferAction::Abandon) => Some(EscrowStatus::Abandoned),
        (EscrowStatus::Disputed, OfferAction::Resolve(outcome)) => Some(outcome.into()),
        _ => None,
    }
}
