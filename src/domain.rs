pub mod audit;
pub mod error;
pub mod id;
pub mod money;
pub mod notify;
pub mod order;
pub mod payment;
pub mod provider;
pub mod reference;
pub mod store;
