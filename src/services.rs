pub mod checkout;
pub mod confirmation;
pub mod poller;
pub mod registry;
