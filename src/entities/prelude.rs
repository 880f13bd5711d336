pub use super::job_status::Entity as JobStatus;
pub use super::offers::Entity as Offers;
pub use super::products::Entity as Products;
pub use super::transactions::Entity as Transactions;
pub use super::users::Entity as Users;
