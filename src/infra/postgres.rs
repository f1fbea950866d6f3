pub mod audit_repo;
pub mod payment_repo;

pub use payment_repo::PgPaymentStore;
