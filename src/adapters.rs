pub mod api_errors;
pub mod base_pay;
pub mod checkout_api;
pub mod http_client;
pub mod notifier;
pub mod routes;
pub mod signature;
pub mod stripe_client;
pub mod webhooks;
pub mod wompi;
