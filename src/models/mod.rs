pub mod admin;
pub mod escrow;
pub mod offer;
