//! Admin escrow models: dashboard counters and dispute adjudication

use serde::{Deserialize, Serialize};

use crate::models::escrow::{EscrowStatus, ResolveOutcome};

/// Escrow activity counters for the admin dashboard overview
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscrowStatsResponse {
    pub total: u64,
    pub pending: u64,
    pub accepted: u64,
    pub in_escrow: u64,
    pub success: u64,
    pub failed: u64,
    pub rejected: u64,
    pub cancelled: u64,
    pub disputed: u64,
    pub abandoned: u64,
}

impl EscrowStatsResponse {
    /// Fold (status, count) rows into the counter struct; rows with a
    /// status string the code no longer knows are counted in `total` only.
    pub fn from_counts(counts: &[(String, i64)]) -> Self {
        let mut stats = Self::default();
        for (status, count) in counts {
            let count = *count as u64;
            stats.total += count;
            match status.parse::<EscrowStatus>() {
                Ok(EscrowStatus::Pending) => stats.pending += count,
                Ok(EscrowStatus::Accepted) => stats.accepted += count,
                Ok(EscrowStatus::InEscrow) => stats.in_escrow += count,
                Ok(EscrowStatus::Success) => stats.success += count,
                Ok(EscrowStatus::Failed) => stats.failed += count,
                Ok(EscrowStatus::Rejected) => stats.rejected += count,
                Ok(EscrowStatus::Cancelled) => stats.cancelled += count,
                Ok(EscrowStatus::Disputed) => stats.disputed += count,
                Ok(EscrowStatus::Abandoned) => stats.abandoned += count,
                Err(_) => {}
            }
        }
        stats
    }
}

/// Body for POST /admin/offers/{id}/resolve
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveRequest {
    pub outcome: ResolveOutcome,
}

/// Response for a resolved dispute; the dashboard re-fetches the offer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub id: i32,
    pub status: EscrowStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_counts() {
        let counts = vec![
            ("pending".to_string(), 4),
            ("in_escrow".to_string(), 2),
            ("success".to_string(), 9),
            ("legacy_state".to_string(), 1),
        ];
        let stats = EscrowStatsResponse::from_counts(&counts);
        assert_eq!(stats.total, 16);
        assert_eq!(stats.pending, 4);
        assert_eq!(stats.in_escrow, 2);
        assert_eq!(stats.success, 9);
        assert_eq!(stats.disputed, 0);
    }
}
