pub mod admin;
pub mod offer;
pub mod payment;
